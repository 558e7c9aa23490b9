//! Shared proptest strategies for scalar types and values.

use proptest::prelude::*;

use crate::{ScalarType, ScalarValue};

pub fn scalar_type() -> impl Strategy<Value = ScalarType> {
    any::<ScalarType>()
}

pub fn scalar_value() -> impl Strategy<Value = ScalarValue> {
    prop_oneof![
        any::<i8>().prop_map(ScalarValue::Char),
        any::<u8>().prop_map(ScalarValue::UChar),
        any::<i16>().prop_map(ScalarValue::Short),
        any::<u16>().prop_map(ScalarValue::UShort),
        any::<i32>().prop_map(ScalarValue::Int),
        any::<u32>().prop_map(ScalarValue::UInt),
        any::<i64>().prop_map(ScalarValue::Long),
        any::<u64>().prop_map(ScalarValue::ULong),
        any::<f32>().prop_map(ScalarValue::Float),
        any::<f64>().prop_map(ScalarValue::Double),
    ]
}
