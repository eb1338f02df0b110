pub mod level;
pub mod onoff;
