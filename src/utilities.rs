use nanoid::nanoid;

const ID_ALPHABET: &[char] = &[
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Short lowercase id used to tell requests apart in logs.
pub fn request_id(len: usize) -> String {
    nanoid!(len, &ID_ALPHABET)
}
