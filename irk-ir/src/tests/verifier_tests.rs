use std::process::Command;

use crate::{
    Attribute, AttributeIndex, AttributeKind, BinaryOp, ContextId, FunctionId, HandleArena, IntPredicate, IrError,
    VerificationResult, VerificationState, VerifierAction,
};

fn declare_binary(arena: &mut HandleArena, ctx: ContextId, name: &str) -> FunctionId {
    let i32_ty = arena.types().get_integer(ctx, 32).unwrap();
    let sig = arena.types().get_function_signature(i32_ty, &[i32_ty, i32_ty], false).unwrap();
    arena.values().declare_function(ctx, name, sig).unwrap()
}

fn verify(arena: &mut HandleArena, f: FunctionId) -> VerificationResult {
    arena.verifier().verify(f, VerifierAction::ReturnStatus).unwrap()
}

fn assert_invalid_mentions(result: &VerificationResult, needle: &str) {
    assert!(!result.is_valid(), "expected an invalid function");
    assert!(
        result.reasons().iter().any(|reason| reason.contains(needle)),
        "no reason mentions '{needle}': {:?}",
        result.reasons()
    );
}

#[test]
fn test_unterminated_entry_block_is_invalid() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    arena.functions().append_basic_block(f, "entry").unwrap();

    let result = verify(&mut arena, f);
    match &result {
        VerificationResult::Invalid(reasons) => assert!(!reasons.is_empty()),
        VerificationResult::Verified => panic!("unterminated block verified"),
    }
    assert_invalid_mentions(&result, "@f/entry");
}

#[test]
fn test_state_machine() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    assert_eq!(arena.verifier().state(f).unwrap(), VerificationState::Unverified);

    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let result = verify(&mut arena, f);
    assert_eq!(arena.verifier().state(f).unwrap(), VerificationState::Invalid(result.reasons().to_vec()));

    let a = arena.functions().get_parameter(f, 0).unwrap();
    let b = arena.functions().get_parameter(f, 1).unwrap();
    let sum = arena.instructions().build_binary(entry, BinaryOp::Add, a, b, "sum").unwrap();
    assert_eq!(arena.verifier().state(f).unwrap(), VerificationState::Unverified);
    arena.instructions().build_return(entry, Some(sum)).unwrap();

    assert_eq!(verify(&mut arena, f), VerificationResult::Verified);
    assert_eq!(arena.verifier().state(f).unwrap(), VerificationState::Verified);

    arena.functions().add_attribute(f, AttributeIndex::Function, Attribute::flag(AttributeKind::NoUnwind)).unwrap();
    assert_eq!(arena.verifier().state(f).unwrap(), VerificationState::Unverified);
}

#[test]
fn test_declaration_without_body_is_valid() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "extern_fn");
    assert!(verify(&mut arena, f).is_valid());
}

#[test]
fn test_terminator_in_the_middle() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let a = arena.functions().get_parameter(f, 0).unwrap();
    arena.instructions().build_return(entry, Some(a)).unwrap();
    arena.instructions().build_return(entry, Some(a)).unwrap();

    assert_invalid_mentions(&verify(&mut arena, f), "in the middle of the block");
}

#[test]
fn test_use_not_dominated_by_definition() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let left = arena.functions().append_basic_block(f, "left").unwrap();
    let right = arena.functions().append_basic_block(f, "right").unwrap();
    let a = arena.functions().get_parameter(f, 0).unwrap();
    let b = arena.functions().get_parameter(f, 1).unwrap();

    let cond = arena.instructions().build_icmp(entry, IntPredicate::Slt, a, b, "cond").unwrap();
    arena.instructions().build_cond_branch(entry, cond, left, right).unwrap();
    let diff = arena.instructions().build_binary(left, BinaryOp::Sub, b, a, "diff").unwrap();
    arena.instructions().build_return(left, Some(diff)).unwrap();
    // `diff` lives in a sibling block
    arena.instructions().build_return(right, Some(diff)).unwrap();

    assert_invalid_mentions(&verify(&mut arena, f), "does not dominate");
}

#[test]
fn test_dominating_definition_is_accepted() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "max");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let then_block = arena.functions().append_basic_block(f, "then").unwrap();
    let else_block = arena.functions().append_basic_block(f, "else").unwrap();
    let a = arena.functions().get_parameter(f, 0).unwrap();
    let b = arena.functions().get_parameter(f, 1).unwrap();

    let cond = arena.instructions().build_icmp(entry, IntPredicate::Sgt, a, b, "cond").unwrap();
    let picked = arena.instructions().build_select(entry, cond, a, b, "picked").unwrap();
    arena.instructions().build_cond_branch(entry, cond, then_block, else_block).unwrap();
    arena.instructions().build_return(then_block, Some(picked)).unwrap();
    arena.instructions().build_return(else_block, Some(picked)).unwrap();

    assert_eq!(verify(&mut arena, f), VerificationResult::Verified);
}

#[test]
fn test_operand_from_another_function() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let g = declare_binary(&mut arena, ctx, "g");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let foreign = arena.functions().get_parameter(g, 0).unwrap();
    arena.instructions().build_return(entry, Some(foreign)).unwrap();

    assert_invalid_mentions(&verify(&mut arena, f), "belongs to another function");
}

#[test]
fn test_branch_targets() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let g = declare_binary(&mut arena, ctx, "g");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let body = arena.functions().append_basic_block(f, "body").unwrap();
    let elsewhere = arena.functions().append_basic_block(g, "elsewhere").unwrap();

    arena.instructions().build_branch(entry, body).unwrap();
    arena.instructions().build_branch(body, entry).unwrap();
    let back_edge = verify(&mut arena, f);
    assert_invalid_mentions(&back_edge, "entry block cannot be a branch target");

    let other = declare_binary(&mut arena, ctx, "h");
    let start = arena.functions().append_basic_block(other, "start").unwrap();
    arena.instructions().build_branch(start, elsewhere).unwrap();
    assert_invalid_mentions(&verify(&mut arena, other), "is not a block of this function");
}

#[test]
fn test_unreachable_block_is_only_a_warning() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let dead = arena.functions().append_basic_block(f, "dead").unwrap();
    let a = arena.functions().get_parameter(f, 0).unwrap();
    arena.instructions().build_return(entry, Some(a)).unwrap();
    arena.instructions().build_unreachable(dead).unwrap();

    assert!(verify(&mut arena, f).is_valid());
}

#[test]
fn test_misplaced_attribute() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    arena
        .functions()
        .add_attribute(f, AttributeIndex::Return, Attribute::flag(AttributeKind::NoInline))
        .unwrap();

    assert_invalid_mentions(&verify(&mut arena, f), "does not apply to return");
}

#[test]
fn test_call_to_deleted_function() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let callee = declare_binary(&mut arena, ctx, "callee");
    let caller = declare_binary(&mut arena, ctx, "caller");
    let entry = arena.functions().append_basic_block(caller, "entry").unwrap();
    let args = arena.functions().parameters(caller).unwrap();
    let result = arena.instructions().build_call(entry, callee, &args, "result").unwrap();
    arena.instructions().build_return(entry, Some(result)).unwrap();
    assert!(verify(&mut arena, caller).is_valid());

    arena.functions().delete_function(callee).unwrap();
    assert_invalid_mentions(&verify(&mut arena, caller), "call to released function");
}

#[test]
fn test_verify_module_collects_reasons() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let g = declare_binary(&mut arena, ctx, "g");
    arena.functions().append_basic_block(f, "entry").unwrap();
    arena.functions().append_basic_block(g, "entry").unwrap();

    let result = arena.verifier().verify_module(ctx, VerifierAction::ReturnStatus).unwrap();
    assert_eq!(result.reasons().len(), 2);
    match result.into_result() {
        Err(IrError::Invalid { reasons }) => assert_eq!(reasons.len(), 2),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_scenario_add_function() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();

    let before = verify(&mut arena, f);
    assert!(matches!(before, VerificationResult::Invalid(ref reasons) if !reasons.is_empty()));

    let a = arena.functions().get_parameter(f, 0).unwrap();
    let b = arena.functions().get_parameter(f, 1).unwrap();
    let sum = arena.instructions().build_binary(entry, BinaryOp::Add, a, b, "").unwrap();
    arena.instructions().build_return(entry, Some(sum)).unwrap();
    assert_eq!(verify(&mut arena, f), VerificationResult::Verified);
}

const ABORT_CHILD_ENV: &str = "IRK_VERIFIER_ABORT_CHILD";

#[test]
fn test_print_and_abort_keeps_valid_functions() {
    let mut arena = HandleArena::new();
    let ctx = arena.create_context();
    let f = declare_binary(&mut arena, ctx, "f");
    let entry = arena.functions().append_basic_block(f, "entry").unwrap();
    let a = arena.functions().get_parameter(f, 0).unwrap();
    arena.instructions().build_return(entry, Some(a)).unwrap();

    let result = arena.verifier().verify(f, VerifierAction::PrintAndAbort).unwrap();
    assert_eq!(result, VerificationResult::Verified);
}

#[test]
fn test_print_and_abort_aborts_on_invalid_function() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        let mut arena = HandleArena::new();
        let ctx = arena.create_context();
        let f = declare_binary(&mut arena, ctx, "f");
        arena.functions().append_basic_block(f, "entry").unwrap();
        let _ = arena.verifier().verify(f, VerifierAction::PrintAndAbort);
        unreachable!("verification of an unterminated block returned");
    }

    // Re-run only this test in a child process, which must abort
    let output = Command::new(std::env::current_exe().unwrap())
        .args([
            "tests::verifier_tests::test_print_and_abort_aborts_on_invalid_function",
            "--exact",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(ABORT_CHILD_ENV, "1")
        .output()
        .unwrap();

    assert!(!output.status.success(), "child exited successfully");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("verification of function @f failed"), "stderr: {stderr}");
    assert!(stderr.contains("@f/entry"), "stderr: {stderr}");
    assert!(!stderr.contains("unterminated block returned"), "stderr: {stderr}");

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "expected SIGABRT, got {:?}", output.status);
    }
}
