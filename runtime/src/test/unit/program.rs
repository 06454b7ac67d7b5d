use std::sync::Arc;

use tessel_dtype::{Arch, DType};
use tessel_ir::{BinaryOp, ConstValue, SNode, SNodeId};

use crate::config::CompileConfig;
use crate::error::Error;
use crate::function::FunctionKey;
use crate::kernel::AutodiffMode;
use crate::program::Program;
use crate::result_buffer::MAX_RESULT_SLOTS;

pub(super) fn program() -> Program {
    Program::with_config(CompileConfig::default()).unwrap()
}

fn field_tree(n: usize, dtype: DType) -> (SNode, SNodeId) {
    let mut root = SNode::root();
    let x = root.dense(&[n]).place("x", dtype);
    (root, x)
}

#[test]
fn test_unknown_arch_falls_back_to_host() {
    let program = Program::with_config(CompileConfig::builder().arch(Arch::Vulkan).build()).unwrap();
    assert_eq!(program.arch(), Arch::host());
    assert_eq!(program.config().arch, Arch::host());
    assert!(Program::num_instances() >= 1);
}

#[test]
fn test_kernel_returns_literal() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let c = b.const_(ConstValue::Int(-7), DType::Int32);
            b.ret(c);
        },
        "literal",
        AutodiffMode::None,
    );

    assert!(!kernel.is_compiled());
    program.launch_kernel(&kernel, &[]).unwrap();
    assert!(kernel.is_compiled());
    assert_eq!(kernel.rets(), [DType::Int32]);
    assert_eq!(program.fetch_result::<i32>(0), -7);
}

#[test]
fn test_float_results_are_bit_exact() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let x = b.const_(ConstValue::Float(0.1), DType::Float64);
            let y = b.const_(ConstValue::Float(0.1), DType::Float32);
            b.ret(x);
            b.ret(y);
        },
        "floats",
        AutodiffMode::None,
    );
    program.launch_kernel(&kernel, &[]).unwrap();

    assert_eq!(program.fetch_result::<f64>(0).to_bits(), 0.1f64.to_bits());
    assert_eq!(program.fetch_result::<f32>(1).to_bits(), 0.1f32.to_bits());
    assert_eq!(program.fetch_result_uint64(1), 0.1f32.to_bits() as u64);
}

#[test]
fn test_kernel_arguments() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let a = b.arg(DType::Int64);
            let c = b.arg(DType::Int64);
            let sum = b.binary(tessel_ir::BinaryOp::Mul, a, c, DType::Int64);
            b.ret(sum);
        },
        "mul",
        AutodiffMode::None,
    );

    program.launch_kernel(&kernel, &[ConstValue::Int(6), ConstValue::Int(7)]).unwrap();
    assert_eq!(program.fetch_result::<i64>(0), 42);

    let err = program.launch_kernel(&kernel, &[ConstValue::Int(6)]).unwrap_err();
    assert!(matches!(err, Error::ArgumentCount { expected: 2, actual: 1, .. }));
}

#[test]
fn test_compile_is_cached() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let c = b.const_(ConstValue::Bool(true), DType::Bool);
            b.ret(c);
        },
        "flag",
        AutodiffMode::Forward,
    );
    let first = program.compile(&kernel).unwrap();
    let second = program.compile(&kernel).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(kernel.autodiff_mode(), AutodiffMode::Forward);
}

#[test]
fn test_too_many_returns_rejected() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let c = b.const_(ConstValue::Int(1), DType::Int32);
            for _ in 0..=MAX_RESULT_SLOTS {
                b.ret(c);
            }
        },
        "wide",
        AutodiffMode::None,
    );

    let err = program.compile(&kernel).err().expect("expected compile error");
    assert!(matches!(err, Error::Compilation { .. }), "{err}");
    assert!(!kernel.is_compiled());
}

#[test]
fn test_invalid_ir_rejected() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let a = b.arg(DType::Int32);
            // Declared void, so the value cannot be used.
            let bad = b.unary(tessel_ir::UnaryOp::Neg, a, DType::Void);
            b.ret(bad);
        },
        "void_result",
        AutodiffMode::None,
    );
    let err = program.compile(&kernel).err().expect("expected compile error");
    assert!(matches!(err, Error::InvalidIr { .. }), "{err}");
}

#[test]
fn test_division_by_zero_is_an_evaluation_error() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let a = b.arg(DType::Int32);
            let zero = b.const_(ConstValue::Int(0), DType::Int32);
            let q = b.binary(tessel_ir::BinaryOp::Idiv, a, zero, DType::Int32);
            b.ret(q);
        },
        "div0",
        AutodiffMode::None,
    );
    let err = program.launch_kernel(&kernel, &[ConstValue::Int(1)]).unwrap_err();
    assert!(matches!(err, Error::Evaluation { .. }), "{err}");
}

#[test]
fn test_field_write_then_read() {
    let mut program = program();
    let (root, x) = field_tree(16, DType::Int32);
    let tree = program.add_snode_tree(root, false).unwrap();

    program.write_snode(x, &[3], ConstValue::Int(42)).unwrap();
    assert_eq!(program.read_snode(x, &[3]).unwrap(), ConstValue::Int(42));
    assert_eq!(program.read_snode(x, &[4]).unwrap(), ConstValue::Int(0));

    assert_eq!(program.get_field_in_tree_offset(tree, x), Some(0));
    assert!(program.get_snode_tree_device_ptr(tree).is_some());
    assert_eq!(program.get_snode_num_dynamically_allocated(x), 0);
    assert_eq!(program.get_snode_root(tree).places()[0].id(), x);
}

#[test]
fn test_accessors_are_cached_per_place() {
    let mut program = program();
    let (root, x) = field_tree(4, DType::Float32);
    program.add_snode_tree(root, false).unwrap();

    let reader = program.get_snode_reader(x).unwrap();
    let writer = program.get_snode_writer(x).unwrap();
    assert!(Arc::ptr_eq(&reader, &program.get_snode_reader(x).unwrap()));
    assert!(Arc::ptr_eq(&writer, &program.get_snode_writer(x).unwrap()));
    assert_eq!(reader.args(), [DType::Int32]);
    assert_eq!(reader.rets(), [DType::Float32]);
    assert_eq!(writer.args(), [DType::Int32, DType::Float32]);
    assert!(writer.rets().is_empty());
}

#[test]
fn test_destroyed_tree_is_no_longer_accessible() {
    let mut program = program();
    let (root, x) = field_tree(8, DType::Int32);
    let tree = program.add_snode_tree(root, false).unwrap();
    program.write_snode(x, &[0], ConstValue::Int(5)).unwrap();
    let stale_reader = program.get_snode_reader(x).unwrap();

    program.destroy_snode_tree(tree).unwrap();

    assert!(program.try_get_snode_root(tree).is_none());
    assert!(matches!(program.get_snode_reader(x).unwrap_err(), Error::SNodeNotFound { .. }));
    let err = program.launch_kernel(&stale_reader, &[ConstValue::Int(0)]).unwrap_err();
    assert!(matches!(err, Error::SNodeNotMaterialized { snode } if snode == x), "{err}");
}

#[test]
fn test_tree_ids_reused_after_destroy() {
    let mut program = program();
    let ids: Vec<_> = (0..3).map(|_| program.add_snode_tree(field_tree(2, DType::Int8).0, false).unwrap()).collect();
    assert_eq!(ids, [0, 1, 2]);

    program.destroy_snode_tree(1).unwrap();
    assert_eq!(program.add_snode_tree(field_tree(2, DType::Int8).0, false).unwrap(), 1);
    assert_eq!(program.add_snode_tree(field_tree(2, DType::Int8).0, false).unwrap(), 3);
    assert_eq!(program.get_snode_tree_size(), 4);
}

#[test]
fn test_compile_only_tree_has_no_storage() {
    let mut program = program();
    let (root, x) = field_tree(4, DType::Int32);
    let tree = program.add_snode_tree(root, true).unwrap();

    assert!(program.snode_tree(tree).unwrap().is_compile_only());
    assert_eq!(program.get_snode_tree_device_ptr(tree), None);
    assert_eq!(program.get_field_in_tree_offset(tree, x), None);
    program.destroy_snode_tree(tree).unwrap();
}

#[test]
fn test_oversized_tree_is_rejected() {
    let mut program = program();
    let (root, x) = field_tree(usize::MAX / 2, DType::Int32);
    let err = program.add_snode_tree(root, false).unwrap_err();
    assert!(matches!(err, Error::SizeOverflow { .. }), "{err}");
    assert!(program.snode_tree(0).is_none());
    assert!(matches!(program.read_snode(x, &[0]), Err(Error::SNodeNotFound { .. })));
}

#[test]
fn test_oversized_texture_is_rejected() {
    let mut program = program();
    let err = program.create_texture(DType::Float32, 4, &[usize::MAX / 8, 8]).unwrap_err();
    assert!(matches!(err, Error::Device { source: tessel_device::Error::SizeOverflow { .. } }), "{err}");
    assert_eq!(program.num_textures(), 0);
}

#[test]
#[should_panic(expected = "is not live")]
fn test_get_snode_root_of_unknown_tree() {
    program().get_snode_root(3);
}

#[test]
#[should_panic(expected = "is not live")]
fn test_destroy_unknown_tree() {
    program().destroy_snode_tree(0).ok();
}

#[test]
fn test_out_of_bounds_without_checks_fails_the_launch() {
    let mut program = program();
    let (root, x) = field_tree(4, DType::Int32);
    program.add_snode_tree(root, false).unwrap();

    let err = program.write_snode(x, &[4], ConstValue::Int(1)).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds { .. }), "{err}");
    program.check_runtime_error().unwrap();
}

#[test]
fn test_out_of_bounds_in_debug_is_a_runtime_error() {
    let mut program = Program::with_config(CompileConfig::builder().debug(true).build()).unwrap();
    let (root, x) = field_tree(4, DType::Int32);
    program.add_snode_tree(root, false).unwrap();

    program.write_snode(x, &[4], ConstValue::Int(1)).unwrap();
    let err = program.check_runtime_error().unwrap_err();
    assert!(matches!(err, Error::Runtime { .. }), "{err}");
    // Reported once.
    program.check_runtime_error().unwrap();
}

#[test]
fn test_functions_deduplicated_by_id() {
    let mut program = program();
    let f = program.create_function(FunctionKey::new("f", 1, 0));
    let renamed = program.create_function(FunctionKey::new("g", 1, 0));
    let instance = program.create_function(FunctionKey::new("f", 1, 1));

    assert!(Arc::ptr_eq(&f, &renamed));
    assert!(!Arc::ptr_eq(&f, &instance));
    assert_eq!(renamed.key().func_name, "f");
    assert_eq!(program.num_functions(), 2);
}

#[test]
fn test_ids_are_monotonic() {
    let program = program();
    let a = program.get_next_global_id();
    let b = program.get_next_global_id();
    assert!(b > a);
    let k = program.get_kernel_id();
    assert!(program.get_kernel_id() > k);
}

#[test]
fn test_default_block_dim_follows_thread_config() {
    let program = program();
    assert_eq!(program.default_block_dim(), 32);
    program.update_this_thread_config(|config| config.default_cpu_block_dim = 8);
    assert_eq!(program.default_block_dim(), 8);
}

#[test]
fn test_worker_compiles_while_main_holds_config_changes() {
    let mut program = program();
    let kernel = program.kernel(
        |b| {
            let c = b.const_(ConstValue::Int(3), DType::Int32);
            b.ret(c);
        },
        "worker_literal",
        AutodiffMode::None,
    );
    program.update_this_thread_config(|config| config.check_out_of_bound = true);

    let program = &program;
    let value = std::thread::scope(|s| {
        let worker = s.spawn(|| {
            assert!(program.this_thread_config().check_out_of_bound, "worker seeds from main");
            program.launch_kernel(&kernel, &[]).unwrap();
            let (one, two) = (ConstValue::Int(1), ConstValue::Int(2));
            program.evaluate_binary(BinaryOp::Add, one, DType::Int32, two, DType::Int32, DType::Int32)
        });
        for dim in 1..=64 {
            program.update_this_thread_config(|config| config.default_cpu_block_dim = dim);
        }
        worker.join().unwrap()
    });

    assert_eq!(value.unwrap(), ConstValue::Int(3));
    assert_eq!(program.default_block_dim(), 64);
    assert_eq!(program.fetch_result_uint64(0), 3);
}

#[test]
fn test_textures_live_with_the_program() {
    let mut program = program();
    let id = program.create_texture(DType::Float32, 4, &[8, 8]).unwrap();
    let texture = program.get_texture(id).unwrap();

    assert_eq!(texture.allocation().size, 8 * 8 * 4 * 4);
    assert_eq!(texture.params().num_channels, 4);
    assert_eq!(program.num_textures(), 1);
}

#[test]
fn test_visualize_layout() {
    let mut program = program();
    program.add_snode_tree(field_tree(4, DType::Int16).0, false).unwrap();

    let path = std::env::temp_dir().join(format!("tessel-layout-{}.txt", std::process::id()));
    program.visualize_layout(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(text.starts_with("tree 0\n"));
    assert!(text.contains("place x int16 [4]"), "{text}");
}

#[test]
fn test_llvm_program_impl_on_host() {
    let program = program();
    assert_eq!(program.llvm_program_impl().name(), "cpu");
    assert!(program.compute_device().is_some());
    assert!(program.graphics_device().is_none());
}

#[test]
fn test_finalize_releases_everything() {
    let mut program = program();
    program.add_snode_tree(field_tree(4, DType::Int32).0, false).unwrap();
    program.create_ndarray(DType::Int32, &[4], Default::default(), true).unwrap();
    program.create_texture(DType::UInt8, 1, &[4]).unwrap();

    program.finalize().unwrap();

    assert!(program.is_finalized());
    assert!(program.memory_pool().is_terminated());
    assert_eq!(program.num_ndarrays(), 0);
    assert_eq!(program.num_textures(), 0);
    assert!(program.kernels().is_empty());
}

#[test]
#[should_panic(expected = "finalized twice")]
fn test_finalize_twice() {
    let mut program = program();
    program.finalize().unwrap();
    program.finalize().ok();
}
