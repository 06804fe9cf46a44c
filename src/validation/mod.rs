/*!
 * Validation of translated units.
 *
 * # Architecture
 *
 * - `markers`: placeholder tags preserved, counted and nested
 * - `length`: visible length ratio between source and translation
 * - `repetition`: runaway looping output
 * - `script`: leftover source-script characters
 * - `directionality`: bidi control marks kept in atomic units
 * - `service`: runs the checks in order
 */

pub mod directionality;
pub mod length;
pub mod markers;
pub mod repetition;
pub mod script;
pub mod service;

pub use service::{InvalidReason, Validation, ValidationConfig, Validator};
