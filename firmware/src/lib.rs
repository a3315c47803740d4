//! Firmware-side logic: the line parser, serial line assembler, protocol
//! responder, dispatcher main loop, and the two narrow external-collaborator
//! seams (`ui`, `file_reader`). Kept as a library so both the `quill_fw`
//! binary and its integration tests can drive the same code.

pub mod dispatcher;
pub mod file_reader;
pub mod parser;
pub mod responder;
pub mod serial;
pub mod testing;
pub mod ui;

pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::file_reader::{FileReader, NoFileReader};
    pub use crate::parser::parse_line;
    pub use crate::responder::FirmwareInfo;
    pub use crate::serial::SerialLineAssembler;
    pub use crate::ui::{NullUi, UiScreen};
}
