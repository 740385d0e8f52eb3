pub mod logger;
pub mod signals;
pub mod startup;
