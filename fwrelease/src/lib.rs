//! # fwrelease
//!
//! Post-build tooling for MCUboot-based firmware: reads the generated build
//! metadata header, cuts the application out of the flashed image, signs it with
//! `imgtool` (locally or through a sign server), emits the update manifest and the
//! boot metadata header, and packages dated release directories. The probe and
//! serial helpers cover flashing and watching a board afterwards.

pub mod bootmeta;
pub mod config;
pub mod ctx;
pub mod hexfile;
pub mod image;
pub mod manifest;
pub mod metadata;
pub mod pipeline;
pub mod probe;
pub mod release;
pub mod sign;
pub mod ui;
pub mod utils;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
