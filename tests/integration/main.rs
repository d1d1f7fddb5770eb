//! Integration tests: full runs against an in-memory NationStates session.

mod mock_session;
mod run;
