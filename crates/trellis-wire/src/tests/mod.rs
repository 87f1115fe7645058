//! Behavioural coverage for frame handling across the codec.
