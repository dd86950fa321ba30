//! XML parsing and output.

mod parser;
mod printer;

pub use parser::{parse_file, parse_str};
pub use printer::{print_to_string, print_to_string_pretty, XmlPrinter, XmlPrinterOptions};
