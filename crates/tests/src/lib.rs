pub mod fixtures;

#[cfg(test)]
mod invite_tests;
#[cfg(test)]
mod session_flow_tests;
#[cfg(test)]
mod expiry_tests;
