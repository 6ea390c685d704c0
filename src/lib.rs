//! Translation toolchain for the Hack platform, featuring:
//! - an assembler (`.asm` -> `.hack`)
//! - a VM translator (`.vm` -> `.asm`)
//! - a Jack compiler (`.jack` -> `.vm`, optionally `.xml`)

pub mod error;
pub mod hack_asm;
pub mod jack;
pub mod logging;
pub mod vm_translate;
