mod common;
mod console;
mod validation;
