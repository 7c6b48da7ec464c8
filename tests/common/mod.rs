#![allow(dead_code)]
#![allow(unused_imports)]

pub use parless_test_utils::builders;
pub use parless_test_utils::fake_compiler;
pub use parless_test_utils::scripted_launcher;
pub use parless_test_utils::{init_tracing, with_timeout};
