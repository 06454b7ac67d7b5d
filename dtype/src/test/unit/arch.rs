use test_case::test_case;

use crate::Arch;

#[test_case("x64", Some(Arch::X64); "lowercase")]
#[test_case("CUDA", Some(Arch::Cuda); "uppercase")]
#[test_case(" vulkan ", Some(Arch::Vulkan); "padded")]
#[test_case("opengl", Some(Arch::OpenGl); "opengl")]
#[test_case("tpu", None; "unknown")]
fn test_arch_parse(input: &str, expected: Option<Arch>) {
    assert_eq!(Arch::parse(input), expected);
}

#[test]
fn test_host_is_cpu() {
    assert!(Arch::host().is_cpu());
    assert!(Arch::host().uses_llvm());
    assert_eq!(Arch::default(), Arch::host());
}

#[test]
fn test_graphics_arches_do_not_use_llvm() {
    use strum::IntoEnumIterator;

    for arch in Arch::iter().filter(Arch::has_graphics) {
        assert!(!arch.uses_llvm(), "{arch} should not be llvm-backed");
        assert!(!arch.is_cpu());
    }
}

#[test]
fn test_display_roundtrips_through_parse() {
    use strum::IntoEnumIterator;

    for arch in Arch::iter() {
        assert_eq!(Arch::parse(&arch.to_string()), Some(arch));
    }
}
