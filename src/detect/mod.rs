// Payload inspection — image signature sniffing and artifact decoding.

pub mod format;
