use pretty_assertions::assert_eq;

use crate::printer::format_type;
use crate::{
    Attribute, AttributeIndex, AttributeKind, BinaryOp, CallConvention, HandleArena, IntPredicate, ModuleSummary,
    VerifierAction,
};

#[test]
fn test_type_spelling() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let i8_ty = arena.types().get_integer(ctx, 8).unwrap();
    let void = arena.types().get_void(ctx).unwrap();
    let array = arena.types().get_array(i8_ty, 4).unwrap();
    let record = arena.types().get_struct(ctx, &[i32_ty, array], false).unwrap();
    let packed = arena.types().get_struct(ctx, &[i8_ty, i8_ty], true).unwrap();
    let empty = arena.types().get_struct(ctx, &[], false).unwrap();
    let variadic = arena.types().get_function_signature(i32_ty, &[i8_ty], true).unwrap();
    let nullary = arena.types().get_function_signature(void, &[], false).unwrap();

    assert_eq!(format_type(&arena, array).unwrap(), "[4 x i8]");
    assert_eq!(format_type(&arena, record).unwrap(), "{ i32, [4 x i8] }");
    assert_eq!(format_type(&arena, packed).unwrap(), "<{ i8, i8 }>");
    assert_eq!(format_type(&arena, empty).unwrap(), "{}");
    assert_eq!(format_type(&arena, variadic).unwrap(), "i32 (i8, ...)");
    assert_eq!(format_type(&arena, nullary).unwrap(), "void ()");
}

#[test]
fn test_print_module() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context_named("demo");
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let i8_ty = arena.types().get_integer(ctx, 8).unwrap();

    let ext_sig = arena.types().get_function_signature(i32_ty, &[i8_ty], true).unwrap();
    let ext = arena.values().declare_function(ctx, "ext", ext_sig).unwrap();
    arena.functions().set_call_convention(ext, CallConvention::Fast).unwrap();

    let add_sig = arena.types().get_function_signature(i32_ty, &[i32_ty, i32_ty], false).unwrap();
    let add = arena.values().declare_function(ctx, "add", add_sig).unwrap();
    let a = arena.functions().get_parameter(add, 0).unwrap();
    let b = arena.functions().get_parameter(add, 1).unwrap();
    arena.values().set_name(a, "a").unwrap();
    arena.values().set_name(b, "b").unwrap();
    arena.functions().add_attribute(add, AttributeIndex::Param(0), Attribute::flag(AttributeKind::NoUndef)).unwrap();
    arena.functions().add_attribute(add, AttributeIndex::Function, Attribute::flag(AttributeKind::NoInline)).unwrap();
    arena.functions().set_garbage_collector(add, "shadow-stack").unwrap();

    let entry = arena.functions().append_basic_block(add, "entry").unwrap();
    let fail = arena.functions().append_basic_block(add, "fail").unwrap();
    let done = arena.functions().append_basic_block(add, "done").unwrap();
    let seven = arena.values().const_int(i8_ty, 7).unwrap();
    let zero = arena.values().const_int(i32_ty, 0).unwrap();
    let minus_one = arena.values().const_int(i32_ty, -1).unwrap();

    let mut builder = arena.instructions();
    let sum = builder.build_binary(entry, BinaryOp::Add, a, b, "sum").unwrap();
    let r = builder.build_call(entry, ext, &[seven, sum], "r").unwrap();
    let neg = builder.build_icmp(entry, IntPredicate::Slt, r, zero, "neg").unwrap();
    builder.build_cond_branch(entry, neg, fail, done).unwrap();
    builder.build_return(fail, Some(minus_one)).unwrap();
    builder.build_return(done, Some(r)).unwrap();

    assert!(arena.verifier().verify_module(ctx, VerifierAction::ReturnStatus).unwrap().is_valid());

    let expected = r#"; ModuleID = 'demo'
source_filename = "demo"

declare fastcc i32 @ext(i8, ...)

define i32 @add(i32 noundef %a, i32 %b) noinline gc "shadow-stack" {
entry:
  %sum = add i32 %a, %b
  %r = call fastcc i32 @ext(i8 7, i32 %sum)
  %neg = icmp slt i32 %r, 0
  br i1 %neg, label %fail, label %done

fail:
  ret i32 -1

done:
  ret i32 %r
}
"#;
    assert_eq!(arena.module_to_string(ctx).unwrap(), expected);
    assert_eq!(String::from_utf8(arena.emit_module(ctx).unwrap()).unwrap(), expected);
}

#[test]
fn test_unnamed_values_are_numbered() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let sig = arena.types().get_function_signature(i32_ty, &[i32_ty, i32_ty], false).unwrap();
    let f = arena.values().declare_function(ctx, "f", sig).unwrap();
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let a = arena.functions().get_parameter(f, 0).unwrap();
    let b = arena.functions().get_parameter(f, 1).unwrap();
    let product = arena.instructions().build_binary(entry, BinaryOp::Mul, a, b, "").unwrap();
    arena.instructions().build_return(entry, Some(product)).unwrap();

    let expected = "define i32 @f(i32 %0, i32 %1) {
entry:
  %2 = mul i32 %0, %1
  ret i32 %2
}
";
    assert_eq!(arena.function_to_string(f).unwrap(), expected);
}

#[test]
fn test_constants_in_operands() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i8_ty = arena.types().get_integer(ctx, 8).unwrap();
    let text = arena.values().const_string(ctx, b"hi\n", true).unwrap();
    let text_ty = arena.type_of(text).unwrap();
    let sig = arena.types().get_function_signature(text_ty, &[], false).unwrap();
    let f = arena.values().declare_function(ctx, "greeting", sig).unwrap();
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    arena.instructions().build_return(entry, Some(text)).unwrap();

    let one = arena.values().const_int(i8_ty, 1).unwrap();
    let two = arena.values().const_int(i8_ty, 2).unwrap();
    let pair = arena.values().const_array(i8_ty, &[one, two]).unwrap();
    let pair_ty = arena.type_of(pair).unwrap();
    let sig = arena.types().get_function_signature(pair_ty, &[], false).unwrap();
    let g = arena.values().declare_function(ctx, "pair", sig).unwrap();
    let entry = arena.functions().append_basic_block(g, "entry").unwrap();
    arena.instructions().build_return(entry, Some(pair)).unwrap();

    assert_eq!(
        arena.function_to_string(f).unwrap(),
        "define [4 x i8] @greeting() {\nentry:\n  ret [4 x i8] c\"hi\\0A\\00\"\n}\n"
    );
    assert_eq!(
        arena.function_to_string(g).unwrap(),
        "define [2 x i8] @pair() {\nentry:\n  ret [2 x i8] [i8 1, i8 2]\n}\n"
    );
}

#[test]
fn test_module_summary() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context_named("summary");
    let void = arena.types().get_void(ctx).unwrap();
    let sig = arena.types().get_function_signature(void, &[], false).unwrap();
    let f = arena.values().declare_function(ctx, "main", sig).unwrap();
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    arena.instructions().build_return(entry, None).unwrap();
    arena.verifier().verify(f, VerifierAction::ReturnStatus).unwrap();

    let summary = ModuleSummary::collect(&arena, ctx).unwrap();
    assert!(summary.is_verified());
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "module": "summary",
            "functions": [{
                "name": "main",
                "signature": "void ()",
                "call_convention": 0,
                "parameters": 0,
                "blocks": [{ "name": "entry", "instructions": 1 }],
                "function_attributes": [],
                "state": "verified"
            }]
        })
    );
}

#[test]
fn test_wide_integer_constants_print_signed() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let i128_ty = arena.types().get_integer(ctx, 128).unwrap();
    let sig = arena.types().get_function_signature(i128_ty, &[], false).unwrap();
    let f = arena.values().declare_function(ctx, "minus_one", sig).unwrap();
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let minus_one = arena.values().const_int(i128_ty, -1).unwrap();
    arena.instructions().build_return(entry, Some(minus_one)).unwrap();

    assert_eq!(
        arena.function_to_string(f).unwrap(),
        "define i128 @minus_one() {\nentry:\n  ret i128 -1\n}\n"
    );
}
