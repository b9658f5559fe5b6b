//! Property tests for deterministic id derivation

use proptest::prelude::*;
use void_core::*;

fn uuid_id() -> impl Strategy<Value = ObjectId> {
    any::<u128>().prop_map(|bits| {
        let hex = format!("{:032x}", bits);
        ObjectId::new(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    })
}

proptest! {
    #[test]
    fn derive_is_an_involution(a in uuid_id(), b in uuid_id()) {
        prop_assert_eq!(a.derive(&b).derive(&b), a);
    }

    #[test]
    fn derive_is_deterministic(a in uuid_id(), b in uuid_id()) {
        prop_assert_eq!(derive_object_id(&a, &b), derive_object_id(&a, &b));
        prop_assert_eq!(a.derive(&b), b.derive(&a));
    }

    #[test]
    fn derive_of_arbitrary_strings_is_a_uuid(a in "[a-z]{1,12}", b in "[a-z]{1,12}") {
        let derived = ObjectId::new(a).derive(&ObjectId::new(b));
        prop_assert!(ObjectId::parse_uuid(derived.as_str()).is_ok());
    }
}
