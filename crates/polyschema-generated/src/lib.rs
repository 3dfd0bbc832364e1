//! Rust types generated at build time from the schemas the workspace is
//! tested against.
//!
//! `build.rs` runs the Rust backend over each schema; every module below
//! is its output. The generated `tests` modules round-trip synthesized
//! instances through every content type, so `cargo test` here compiles
//! and exercises the generator's real output.

pub mod value {
    include!(concat!(env!("OUT_DIR"), "/value.rs"));
}

pub mod order {
    include!(concat!(env!("OUT_DIR"), "/order.rs"));
}

pub mod drawing {
    include!(concat!(env!("OUT_DIR"), "/drawing.rs"));
}

pub mod reading {
    include!(concat!(env!("OUT_DIR"), "/reading.rs"));
}
