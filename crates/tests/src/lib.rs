#[cfg(test)]
mod common;

#[cfg(test)]
mod analysis_tests;
#[cfg(test)]
mod auth_tests;
#[cfg(test)]
mod document_tests;
#[cfg(test)]
mod history_tests;
#[cfg(test)]
mod usage_tests;
