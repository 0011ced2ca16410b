//! Scenario tests driving the whole tick loop through test doubles.
