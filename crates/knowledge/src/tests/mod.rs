//! Pipeline scenarios wiring the real components to in-process backends.

mod answer_scenarios;
mod support;
