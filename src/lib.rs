//! `ambicam` drives a perimeter LED strip from a camera pointed at a screen.
//!
//! # Structure
//!
//! * [models] holds the configuration, the screen geometry and the calibration mapping.
//! * [markers] renders one calibration marker per LED zone.
//! * [calibration] maps every zone to a rectangle of the camera frame.
//! * [image] decodes frames, corrects the lens distortion and samples zone colors.
//! * [session] runs the live capture, correct, sample and commit loop.
//! * [camera], [device] and [web] are the capture, LED and preview collaborators.

#[macro_use]
extern crate tracing;

pub mod calibration;
pub mod camera;
pub mod color;
pub mod device;
pub mod image;
pub mod markers;
pub mod models;
pub mod paths;
pub mod session;
pub mod web;
