#![cfg(test)]

mod buffer;
mod common;
mod sections;
