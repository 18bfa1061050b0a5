// Discord commands module.
// Each feature gets its own command file.

pub mod graduation;

pub mod karma;

pub mod rolerestore;
