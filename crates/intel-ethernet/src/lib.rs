//! Descriptor types shared by Intel's advanced (82599-family) receive and
//! transmit rings, plus the register type aliases queue initialization
//! code reads.

pub mod descriptors;
pub mod types;
