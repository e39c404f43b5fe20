#[macro_use]
extern crate log;

use std::sync::Once;

mod alpn;
mod client;
mod tester;

pub use self::alpn::*;
pub use self::client::*;
pub use self::tester::*;

// Bind on IPv4 because IPv6 is broken on CI
pub const BIND_HOST: &str = "127.0.0.1";

pub fn init_logger() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        env_logger::init();
    });
}
