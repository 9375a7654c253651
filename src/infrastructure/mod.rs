pub mod bluetooth;
pub mod device;
pub mod logging;
