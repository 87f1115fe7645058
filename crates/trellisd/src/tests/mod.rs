//! Behavioural suites for the controller engine.

mod session_behaviour;
mod support;
