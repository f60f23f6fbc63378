//! # OpenSim Interoperability
//!
//! Readers and writers for the file formats an OpenSim workflow consumes
//! and produces: TRC marker files, storage files (.sto/.mot), ExternalLoads
//! ground-reaction exports, IK/ID tool setup XML, and Vicon Eclipse .enf
//! metadata. Exports record their outputs in the trial's linked files so a
//! pipeline can chain them.

pub mod enf;
pub mod error;
pub mod external_loads;
pub mod sto;
pub mod tool_setup;
pub mod trc;
pub mod units;

pub use enf::parse_enf;
pub use error::OpenSimIoError;
pub use external_loads::{export_force_platforms, ExternalLoadsOptions};
pub use sto::{read_sto, write_sto, StoData};
pub use tool_setup::{write_id_setup, write_ik_setup, ToolOptions};
pub use trc::{export_trc, TrcOptions};
pub use units::conversion_factor;
