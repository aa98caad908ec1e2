pub mod appointment;
pub mod emergency;
pub mod enums;
pub mod health_log;
pub mod hospital;
pub mod language;
pub mod medication;
pub mod profile;
pub mod voice;

pub use appointment::*;
pub use emergency::*;
pub use enums::*;
pub use health_log::*;
pub use hospital::*;
pub use language::*;
pub use medication::*;
pub use profile::*;
pub use voice::*;
