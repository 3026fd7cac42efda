use test_case::test_case;

use crate::{ElementType, Layout, Shape};

#[test_case(ElementType::Pred, 1; "pred")]
#[test_case(ElementType::S8, 1; "s8")]
#[test_case(ElementType::U16, 2; "u16")]
#[test_case(ElementType::S32, 4; "s32")]
#[test_case(ElementType::F32, 4; "f32")]
#[test_case(ElementType::U64, 8; "u64")]
#[test_case(ElementType::F64, 8; "f64")]
fn element_sizes(element_type: ElementType, expected: usize) {
    assert_eq!(element_type.size_in_bytes(), expected);
}

#[test]
fn array_byte_size() {
    let shape = Shape::array(ElementType::F32, [2, 3, 4]);
    assert_eq!(shape.byte_size(), 2 * 3 * 4 * 4);
    assert!(!shape.is_tuple());
    assert_eq!(shape.tuple_element_count(), 0);
}

#[test]
fn tuple_byte_size_sums_leaves() {
    let shape = Shape::tuple([
        Shape::array(ElementType::F32, [2]),
        Shape::array(ElementType::S64, [3]),
    ]);
    assert_eq!(shape.byte_size(), 2 * 4 + 3 * 8);
    assert!(shape.is_tuple());
    assert!(!shape.is_nested_tuple());
    assert_eq!(shape.tuple_element_count(), 2);
}

#[test]
fn nested_tuple_detection() {
    let nested = Shape::tuple([
        Shape::array(ElementType::F32, [2]),
        Shape::tuple([Shape::array(ElementType::F32, [1])]),
    ]);
    assert!(nested.is_nested_tuple());
}

#[test]
fn layouts_equal_ignores_missing_vs_default() {
    let implicit = Shape::array(ElementType::F32, [4, 4]);
    let explicit = Shape::Array(implicit.as_array().unwrap().clone().with_default_layout());
    assert!(implicit.layouts_equal(&explicit));
}

#[test]
fn layouts_equal_detects_device_layout() {
    let host = Shape::array(ElementType::F32, [4, 4]);
    let device = Shape::Array(
        host.as_array().unwrap().clone().with_layout(Layout::column_major(2)).unwrap(),
    );
    assert!(!host.layouts_equal(&device));
}

#[test]
fn with_layout_rejects_rank_mismatch() {
    let shape = Shape::array(ElementType::F32, [2, 2]);
    let result = shape.as_array().unwrap().clone().with_layout(Layout::row_major(3));
    assert!(result.is_err());
}
