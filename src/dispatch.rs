// CLASSIFICATION: COMMUNITY
// Filename: dispatch.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Static method table and external method dispatch.

use log::warn;
use thiserror::Error;

use crate::companion::Companion;
use crate::report::ReportValue;
use crate::shared::{MODULE_SHORT, NUMBER_OF_METHODS};

/// Status returned to the caller of a rejected method.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IoReturn {
    #[error("unsupported selector")]
    Unsupported,
    #[error("bad argument")]
    BadArgument,
    #[error("not permitted")]
    NotPermitted,
}

impl IoReturn {
    /// Numeric status seen by userspace.
    pub fn code(self) -> u32 {
        match self {
            IoReturn::Unsupported => 0xe000_02c7,
            IoReturn::BadArgument => 0xe000_02c2,
            IoReturn::NotPermitted => 0xe000_02e2,
        }
    }
}

/// Arguments of one method call.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodArguments<'a> {
    pub scalar_input: &'a [u64],
    pub structure_input: &'a [u8],
    pub scalar_output_count: u32,
    pub structure_output_size: u32,
}

impl<'a> MethodArguments<'a> {
    /// Arguments carrying only scalar inputs.
    pub fn scalars(scalar_input: &'a [u64]) -> Self {
        Self {
            scalar_input,
            ..Self::default()
        }
    }
}

/// Action run once a call has passed the shape check.
pub type MethodAction = fn(&Companion, &MethodArguments<'_>) -> Result<(), IoReturn>;

/// Table entry: the action and the exact argument shape it accepts.
#[derive(Clone, Copy)]
pub struct ExternalMethodDispatch {
    pub action: MethodAction,
    pub check_scalar_input_count: u32,
    pub check_structure_input_size: u32,
    pub check_scalar_output_count: u32,
    pub check_structure_output_size: u32,
}

impl ExternalMethodDispatch {
    fn accepts(&self, args: &MethodArguments<'_>) -> bool {
        args.scalar_input.len() == self.check_scalar_input_count as usize
            && args.structure_input.len() == self.check_structure_input_size as usize
            && args.scalar_output_count == self.check_scalar_output_count
            && args.structure_output_size == self.check_structure_output_size
    }
}

/// Method layout compiled into the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Selector 0 records the boot decision read by the gate.
    ReportGate,
    /// Selector 0 restarts the machine immediately.
    DirectReboot,
}

impl Variant {
    /// Variant selected by the `direct-reboot` feature.
    pub fn for_build() -> Self {
        if cfg!(feature = "direct-reboot") {
            Variant::DirectReboot
        } else {
            Variant::ReportGate
        }
    }

    /// Method table indexed by selector.
    pub fn methods(self) -> &'static [ExternalMethodDispatch] {
        match self {
            Variant::ReportGate => &REPORT_METHODS,
            Variant::DirectReboot => &REBOOT_METHODS,
        }
    }
}

static REPORT_METHODS: [ExternalMethodDispatch; NUMBER_OF_METHODS as usize] = [
    // METHOD_REPORT_ACTION
    ExternalMethodDispatch {
        action: method_report_action,
        check_scalar_input_count: 1,
        check_structure_input_size: 0,
        check_scalar_output_count: 0,
        check_structure_output_size: 0,
    },
];

static REBOOT_METHODS: [ExternalMethodDispatch; NUMBER_OF_METHODS as usize] = [
    // METHOD_DO_REBOOT
    ExternalMethodDispatch {
        action: method_do_reboot,
        check_scalar_input_count: 0,
        check_structure_input_size: 0,
        check_scalar_output_count: 0,
        check_structure_output_size: 0,
    },
];

/// Select the table entry for `selector`, check the argument shape and run
/// the action against the provider. Rejections never touch state.
pub fn dispatch(
    target: &Companion,
    methods: &[ExternalMethodDispatch],
    selector: u32,
    args: &MethodArguments<'_>,
) -> Result<(), IoReturn> {
    let entry = methods.get(selector as usize).ok_or_else(|| {
        warn!(target: MODULE_SHORT, "unsupported selector {selector}");
        IoReturn::Unsupported
    })?;
    if !entry.accepts(args) {
        warn!(
            target: MODULE_SHORT,
            "selector {selector}: argument shape mismatch ({} scalars, {} struct bytes)",
            args.scalar_input.len(),
            args.structure_input.len()
        );
        return Err(IoReturn::BadArgument);
    }
    (entry.action)(target, args)
}

fn method_report_action(target: &Companion, args: &MethodArguments<'_>) -> Result<(), IoReturn> {
    let raw = args.scalar_input.first().copied().ok_or(IoReturn::BadArgument)?;
    let value = ReportValue::from_scalar(raw).ok_or_else(|| {
        warn!(target: MODULE_SHORT, "report value {raw} out of range");
        IoReturn::BadArgument
    })?;
    target.report(value).map_err(|_| IoReturn::NotPermitted)
}

fn method_do_reboot(target: &Companion, _args: &MethodArguments<'_>) -> Result<(), IoReturn> {
    target.restart("rebooting machine as requested by RSRRepair from userspace")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{METHOD_REPORT_ACTION, REPORT_SHOULD_REBOOT};

    #[test]
    fn tables_expose_one_method() {
        assert_eq!(Variant::ReportGate.methods().len(), 1);
        assert_eq!(Variant::DirectReboot.methods().len(), 1);
        let report = &Variant::ReportGate.methods()[METHOD_REPORT_ACTION as usize];
        assert_eq!(report.check_scalar_input_count, 1);
    }

    #[test]
    fn shape_check_is_exact() {
        let entry = Variant::ReportGate.methods()[0];
        let one = [u64::from(REPORT_SHOULD_REBOOT)];
        assert!(entry.accepts(&MethodArguments::scalars(&one)));
        assert!(!entry.accepts(&MethodArguments::scalars(&[])));
        assert!(!entry.accepts(&MethodArguments::scalars(&[0, 0])));
        let with_struct = MethodArguments {
            structure_input: &[1],
            ..MethodArguments::scalars(&one)
        };
        assert!(!entry.accepts(&with_struct));
        let with_output = MethodArguments {
            scalar_output_count: 1,
            ..MethodArguments::scalars(&one)
        };
        assert!(!entry.accepts(&with_output));
    }

    #[test]
    fn status_codes_match_iokit() {
        assert_eq!(IoReturn::Unsupported.code(), 0xe00002c7);
        assert_eq!(IoReturn::BadArgument.code(), 0xe00002c2);
        assert_eq!(IoReturn::NotPermitted.code(), 0xe00002e2);
    }
}
