// Shakewatch - Hardware Collaborators
//
// Contracts for the two platform services a session consumes, each with an
// in-process stand-in.

pub mod audio;
pub mod imu;
