use crate::{HandleArena, IrError, TypeKind, ValueKind};

#[test]
fn test_const_string_length() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();

    let terminated = arena.values().const_string(ctx, b"abc", true).unwrap();
    let ty = arena.type_of(terminated).unwrap();
    assert_eq!(arena.types().length(ty).unwrap(), 4);
    assert_eq!(arena.value_kind(terminated).unwrap(), &ValueKind::ConstData { bytes: b"abc\0".to_vec() });

    let plain = arena.values().const_string(ctx, b"abc", false).unwrap();
    let ty = arena.type_of(plain).unwrap();
    assert_eq!(arena.types().length(ty).unwrap(), 3);

    let byte = arena.types().element_type(ty).unwrap();
    assert_eq!(arena.type_kind(byte).unwrap(), &TypeKind::Integer { bits: 8 });
}

#[test]
fn test_empty_string_without_terminator() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let empty = arena.values().const_string(ctx, b"", false).unwrap();
    let ty = arena.type_of(empty).unwrap();
    assert_eq!(arena.types().length(ty).unwrap(), 0);
}

#[test]
fn test_const_array_checks_elements() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let i16_ty = arena.types().get_integer(ctx, 16).unwrap();
    let a = arena.values().const_int(i32_ty, 1).unwrap();
    let b = arena.values().const_int(i32_ty, 2).unwrap();
    let narrow = arena.values().const_int(i16_ty, 3).unwrap();

    let array = arena.values().const_array(i32_ty, &[a, b]).unwrap();
    let array_ty = arena.type_of(array).unwrap();
    assert_eq!(array_ty, arena.types().get_array(i32_ty, 2).unwrap());

    let err = arena.values().const_array(i32_ty, &[a, narrow]).unwrap_err();
    assert_eq!(err, IrError::TypeMismatch { expected: "i32".to_string(), found: "i16".to_string() });
}

#[test]
fn test_const_array_rejects_non_constants_and_foreign_values() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let other = arena.create_context();
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let sig = arena.types().get_function_signature(i32_ty, &[i32_ty], false).unwrap();
    let f = arena.values().declare_function(ctx, "f", sig).unwrap();
    let param = arena.functions().get_parameter(f, 0).unwrap();

    let err = arena.values().const_array(i32_ty, &[param]).unwrap_err();
    assert!(matches!(err, IrError::NotConstant { .. }));

    let foreign_ty = arena.types().get_integer(other, 32).unwrap();
    let foreign = arena.values().const_int(foreign_ty, 1).unwrap();
    let err = arena.values().const_array(i32_ty, &[foreign]).unwrap_err();
    assert!(matches!(err, IrError::CrossContextValue { .. }));
}

#[test]
fn test_const_struct_derives_its_type() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let i8_ty = arena.types().get_integer(ctx, 8).unwrap();
    let a = arena.values().const_int(i32_ty, 1).unwrap();
    let b = arena.values().const_int(i8_ty, 2).unwrap();

    let value = arena.values().const_struct(ctx, &[a, b], true).unwrap();
    let ty = arena.type_of(value).unwrap();
    assert_eq!(ty, arena.types().get_struct(ctx, &[i32_ty, i8_ty], true).unwrap());
    assert_eq!(arena.types().struct_fields(ty).unwrap(), vec![i32_ty, i8_ty]);
}

#[test]
fn test_duplicate_function_name() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let other = arena.create_context();
    let void = arena.types().get_void(ctx).unwrap();
    let sig = arena.types().get_function_signature(void, &[], false).unwrap();

    let f = arena.values().declare_function(ctx, "main", sig).unwrap();
    let err = arena.values().declare_function(ctx, "main", sig).unwrap_err();
    assert_eq!(err, IrError::DuplicateName { name: "main".to_string() });
    assert_eq!(arena.functions_in(ctx).unwrap(), vec![f]);

    // Names are tracked per module, another context is unaffected
    let other_void = arena.types().get_void(other).unwrap();
    let other_sig = arena.types().get_function_signature(other_void, &[], false).unwrap();
    arena.values().declare_function(other, "main", other_sig).unwrap();
}

#[test]
fn test_anonymous_functions_never_collide() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let void = arena.types().get_void(ctx).unwrap();
    let sig = arena.types().get_function_signature(void, &[], false).unwrap();
    let a = arena.values().declare_function(ctx, "", sig).unwrap();
    let b = arena.values().declare_function(ctx, "", sig).unwrap();
    assert_ne!(a, b);
    assert_eq!(arena.values().get_function(ctx, "").unwrap(), None);
}

#[test]
fn test_declare_requires_signature() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let err = arena.values().declare_function(ctx, "f", i32_ty).unwrap_err();
    assert_eq!(err, IrError::type_mismatch("function signature", "i32"));
    assert!(arena.functions_in(ctx).unwrap().is_empty());
}

#[test]
fn test_undef_requires_sized_type() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let label = arena.types().get_label(ctx).unwrap();
    assert!(matches!(arena.values().undef(label), Err(IrError::TypeMismatch { .. })));
    let i64_ty = arena.types().get_integer(ctx, 64).unwrap();
    let undef = arena.values().undef(i64_ty).unwrap();
    assert_eq!(arena.value_kind(undef).unwrap(), &ValueKind::Undef);
}

#[test]
fn test_parameter_names_and_types() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i64_ty = arena.types().get_integer(ctx, 64).unwrap();
    let i1_ty = arena.types().get_integer(ctx, 1).unwrap();
    let sig = arena.types().get_function_signature(i64_ty, &[i1_ty, i64_ty], false).unwrap();
    let f = arena.values().declare_function(ctx, "pick", sig).unwrap();
    let flag = arena.functions().get_parameter(f, 0).unwrap();

    assert_eq!(arena.values().name(flag).unwrap(), "");
    arena.values().set_name(flag, "flag").unwrap();
    assert_eq!(arena.values().name(flag).unwrap(), "flag");
    assert_eq!(arena.values().type_of(flag).unwrap(), i1_ty);
    assert_eq!(arena.values().type_of(f).unwrap(), sig);
    assert_eq!(arena.values().name(f).unwrap(), "pick");
}
