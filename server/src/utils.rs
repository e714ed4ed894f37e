use rand::Rng;
use shared::ROOM_CODE_LEN;

/// Random room code of uppercase ASCII letters.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
        .collect()
}

/// Codes are typed by hand, so accept any case and stray whitespace.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// Cuts on char boundaries so multi-byte text never panics
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_normalize_room_code() {
        assert_eq!(normalize_room_code(" abcd\n"), "ABCD");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
