pub mod klog;
pub mod run;
pub mod tables;
pub mod util;

pub use klog::*;
pub use run::*;
pub use tables::*;
pub use util::*;
