//! Keys shared by the unit tests, the integration tests and dependent crates.

/// 2048-bit merchant key with exponent 65537.
pub const TEST_PUBLIC_KEY: &str = concat!(
    "10001|",
    "A5C3948EA33240F035A6E684F588783E90CD878D6951B0310922E7DCB2C56AC5",
    "659B9C4B99AE7C755847134AE71AED04FE97CE73C4422241EA2F268D26A40D30",
    "941780476664B91A0B70F1F8D3CF58608FBF8FECD1EB97FE6A9AB596C66DFDA9",
    "10380087F71A05BC7E092B77BF49FB22D0BD2CB948790E3B3550C3B8C4322BBC",
    "7FA242F7FCF048A62A266AA674643926B6FBD1BBF5C912E8D28E2FC6D4AF7BF1",
    "793534174707F35F8AC728574E028A6867558F8C677AD4F1FDB9548DDA37B18B",
    "B63510EBFC102901B3B8700A28AB78CF52073713C5765B932CA96C2A5E3A6748",
    "3E573FBBDB97F42909BD0777E99F5C421F6872B272380E54EC2F1C0C29C6067B",
);

/// A well-formed key whose 256-bit modulus is too small to wrap a 32-byte AES key.
pub const UNDERSIZED_PUBLIC_KEY: &str =
    "10001|C5A3F1E0B7D2946881F3A5C7E9D1B3A5C7E9F1A3B5C7D9E1F3A5B7C9D1E3F5A7";
