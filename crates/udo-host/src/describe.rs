//! Text rendering of the structures a package hands back to the host.

use std::ffi::{c_char, CStr};
use std::fmt::Write;

use anyhow::{ensure, Result};
use udo_core::{
    CoreType, DataType, ParamType, UdoImpInfo, UdoLibVersion, UdoOperationInfo, UdoParam,
    UdoRegInfo, UdoTensorInfo,
};

unsafe fn text<'a>(ptr: *const c_char) -> Result<&'a str> {
    ensure!(!ptr.is_null(), "null string");
    Ok(CStr::from_ptr(ptr).to_str()?)
}

unsafe fn items<'a, T>(ptr: *const T, len: u32) -> Result<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    ensure!(!ptr.is_null(), "{len} entries behind a null pointer");
    Ok(std::slice::from_raw_parts(ptr, len as usize))
}

/// Core types set in `mask`, lowest bit first.
pub fn cores(mask: u32) -> Vec<CoreType> {
    (0..u32::BITS)
        .map(|bit| 1 << bit)
        .filter(|bit| mask & bit != 0)
        .map(CoreType)
        .collect()
}

/// Data types set in `mask`, lowest bit first.
pub fn data_types(mask: u32) -> Vec<DataType> {
    (0..u32::BITS)
        .map(|bit| 1 << bit)
        .filter(|bit| mask & bit != 0)
        .map(DataType)
        .collect()
}

pub fn version(version: &UdoLibVersion) -> String {
    format!("{} (api {})", version.lib_version, version.api_version)
}

pub fn imp_info(info: &UdoImpInfo) -> Result<String> {
    let mut out = String::new();
    unsafe {
        writeln!(out, "package:    {}", text(info.package_name)?)?;
        writeln!(out, "core:       {:?}", info.udo_core_type)?;
        writeln!(
            out,
            "operations: {} ({})",
            text(info.operations_string)?,
            info.num_of_operations
        )?;
    }
    Ok(out)
}

/// Walks the whole descriptor. Per-core arrays hold one entry per core in the
/// operation's `supported_by_cores`.
///
/// # Safety
///
/// `info` must come from a live registration library.
pub unsafe fn reg_info(info: &UdoRegInfo) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "package:    {}", text(info.package_name)?)?;
    writeln!(out, "cores:      {:?}", cores(info.supported_core_types))?;
    for lib in items(info.implementation_lib, info.num_of_implementation_lib)? {
        writeln!(out, "impl lib:   {} ({:?})", text(lib.library_name)?, lib.udo_core_type)?;
    }
    writeln!(
        out,
        "operations: {} ({})",
        text(info.operations_string)?,
        info.num_of_operations
    )?;
    for op in items(info.operations_info, info.num_of_operations)? {
        operation(&mut out, op)?;
    }
    Ok(out)
}

unsafe fn operation(out: &mut String, op: &UdoOperationInfo) -> Result<()> {
    let num_cores = op.supported_by_cores.count_ones();
    writeln!(out, "  {}", text(op.operation_type)?)?;
    for core in items(op.op_per_core_info, num_cores)? {
        writeln!(
            out,
            "    core {:?}: computes {:?}",
            core.core_type,
            data_types(core.operation_calculation_types)
        )?;
    }
    for param in items(op.static_params, op.num_of_static_params)? {
        static_param(out, param)?;
    }
    for input in items(op.input_infos, op.num_of_inputs)? {
        tensor(out, "input", input, num_cores)?;
    }
    for output in items(op.output_infos, op.num_of_outputs)? {
        tensor(out, "output", output, num_cores)?;
    }
    Ok(())
}

unsafe fn static_param(out: &mut String, param: &UdoParam) -> Result<()> {
    let name = text(param.param_name)?;
    match param.param_type {
        ParamType::SCALAR => writeln!(
            out,
            "    param {name}: scalar {:?}",
            param.value.scalar_param.data_type
        )?,
        ParamType::TENSOR => writeln!(
            out,
            "    param {name}: tensor {:?} {:?}",
            param.value.tensor_param.data_type, param.value.tensor_param.layout
        )?,
        other => writeln!(out, "    param {name}: {other:?}")?,
    }
    Ok(())
}

unsafe fn tensor(out: &mut String, kind: &str, info: &UdoTensorInfo, num_cores: u32) -> Result<()> {
    let per_core: Vec<String> = items(info.per_core_datatype, num_cores)?
        .iter()
        .map(|d| format!("{:?}={:?}", d.core_type, d.data_type))
        .collect();
    writeln!(
        out,
        "    {kind} {}: {:?} [{}]{}{}",
        text(info.tensor_name)?,
        info.layout,
        per_core.join(", "),
        if info.repeated { " repeated" } else { "" },
        if info.is_static { " static" } else { "" },
    )?;
    Ok(())
}
