#![cfg(test)]

mod emulation;
mod support;
