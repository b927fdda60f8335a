pub mod field_codec;
