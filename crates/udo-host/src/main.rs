mod cli;
mod describe;
mod loader;

use std::ffi::{c_void, CString};
use std::path::Path;
use std::ptr;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;
use udo_core::{
    CoreType, DataType, TensorLayout, UdoCpuInfrastructure, UdoOpDefinition, UdoTensorParam,
};

use loader::{ImplLibrary, RegLibrary};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).context("invalid --log filter")?)
        .init();

    match cli.command {
        Command::Inspect {
            reg_lib,
            validate,
            inputs,
            outputs,
            params,
            core,
        } => {
            let core = parse_core(&core)?;
            let check = validate.map(|op| (op, inputs, outputs, params, core));
            inspect(&reg_lib, check)
        }
        Command::Run {
            impl_lib,
            op,
            shape,
            values,
            repeat,
            core,
        } => {
            let core = parse_core(&core)?;
            run(&impl_lib, &op, core, shape, values, repeat)
        }
    }
}

fn parse_core(raw: &str) -> Result<CoreType> {
    match raw.to_ascii_lowercase().as_str() {
        "cpu" => Ok(CoreType::CPU),
        "gpu" => Ok(CoreType::GPU),
        "dsp" => Ok(CoreType::DSP),
        _ => bail!("unsupported core: {raw} (expected cpu, gpu or dsp)"),
    }
}

fn inspect(path: &Path, check: Option<(String, u32, u32, u32, CoreType)>) -> Result<()> {
    let lib = RegLibrary::load(path)?;
    lib.init()?;
    let _terminate = Cleanup::new("terminateRegLibrary", || lib.terminate());
    tracing::info!(path = %path.display(), "registration library loaded");

    println!("version:    {}", describe::version(&lib.version()?));
    print!("{}", unsafe { describe::reg_info(lib.reg_info()?)? });

    if let Some((op, inputs, outputs, params, core)) = check {
        let name = CString::new(op.as_str())?;
        let mut definition = UdoOpDefinition {
            udo_core_type: core,
            operation_type: name.as_ptr().cast_mut(),
            num_of_static_params: params,
            static_params: ptr::null_mut(),
            num_of_inputs: inputs,
            inputs: ptr::null_mut(),
            num_of_outputs: outputs,
            outputs: ptr::null_mut(),
        };
        let status = lib.validate(&mut definition);
        println!(
            "validate {op} on {core:?} ({params} params, {inputs} in, {outputs} out): {status:?}"
        );
    }
    Ok(())
}

/// Runs a release call when dropped. Failures are logged, not returned.
struct Cleanup<F: FnMut() -> Result<()>> {
    entry: &'static str,
    release: F,
}

impl<F: FnMut() -> Result<()>> Cleanup<F> {
    fn new(entry: &'static str, release: F) -> Self {
        Self { entry, release }
    }
}

impl<F: FnMut() -> Result<()>> Drop for Cleanup<F> {
    fn drop(&mut self) {
        if let Err(err) = (self.release)() {
            tracing::warn!(entry = self.entry, "{err:#}");
        }
    }
}

/// Host-side buffer bound to an operation by shallow reference.
struct HostTensor {
    dims: Vec<u32>,
    data: Vec<f32>,
}

impl HostTensor {
    fn new(dims: Vec<u32>, data: Vec<f32>) -> Self {
        Self { dims, data }
    }

    fn param(&mut self) -> UdoTensorParam {
        UdoTensorParam {
            data_type: DataType::FLOAT_32,
            layout: TensorLayout::NHWC,
            tensor_rank: self.dims.len() as u32,
            max_dimensions: self.dims.as_mut_ptr(),
            curr_dimensions: self.dims.as_mut_ptr(),
            tensor_data: self.data.as_mut_ptr().cast(),
            ..Default::default()
        }
    }
}

// Payload handles are plain host addresses.
unsafe extern "C" fn get_data(handle: *mut c_void) -> *mut c_void {
    handle
}

fn run(
    path: &Path,
    op: &str,
    core: CoreType,
    shape: Vec<u32>,
    values: Vec<f32>,
    repeat: u32,
) -> Result<()> {
    let elements: usize = shape.iter().map(|&d| d as usize).product();
    ensure!(
        elements == values.len(),
        "shape {shape:?} holds {elements} values, got {}",
        values.len()
    );
    ensure!(repeat > 0, "--repeat must be at least 1");

    let lib = ImplLibrary::load(path)?;
    lib.init()?;
    let _terminate = Cleanup::new("terminateImplLibrary", || lib.terminate());
    tracing::info!(path = %path.display(), "implementation library loaded");

    print!("{}", describe::imp_info(lib.imp_info()?)?);
    println!("version:    {}", describe::version(&lib.version()?));

    let mut infra = UdoCpuInfrastructure {
        get_data: Some(get_data),
    };
    let mut a = HostTensor::new(shape.clone(), values);
    let mut b = HostTensor::new(shape, vec![0.0; elements]);
    let name = CString::new(op)?;

    // SAFETY: infra and both tensors are declared before the guards below,
    // so they outlive the factory and the operation.
    let factory = unsafe { lib.create_op_factory(core, ptr::addr_of_mut!(infra).cast(), &name)? };
    let release_factory = Cleanup::new("releaseOpFactory", || lib.release_op_factory(factory));
    let operation =
        unsafe { lib.create_operation(factory, &mut [a.param()], &mut [b.param()])? };
    drop(release_factory);
    let _release_op = Cleanup::new("releaseOp", || lib.release_op(operation));

    let mut total_us = 0u64;
    for id in 0..repeat {
        // Ping-pong: each pass reads the previous pass's output.
        if id > 0 {
            let (src, dst) = if id % 2 == 1 { (&mut b, &mut a) } else { (&mut a, &mut b) };
            unsafe { lib.set_io(operation, &mut [src.param()], &mut [dst.param()])? };
        }
        lib.execute(operation, id)?;
        total_us += u64::from(lib.profile(operation)?);
    }

    let output = if repeat % 2 == 1 { &b.data } else { &a.data };
    println!("output:     {output:?}");
    println!("executions: {repeat}, {total_us} us total");
    Ok(())
}
