/// Exports the implementation library entry points.
///
/// `$init` is a `fn() -> udo_core::Result<()>` that calls
/// [`set_implementation`](crate::set_implementation) and registers the
/// package's definitions.
#[macro_export]
macro_rules! export_impl_library {
    ($init:path) => {
        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_initImplLibrary(
            global_infrastructure: *mut ::std::ffi::c_void,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::init_impl_library(global_infrastructure, $init)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_getImpInfo(
            info: *mut *mut $crate::udo_core::UdoImpInfo,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::get_imp_info(info)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_getVersion(
            version: *mut *mut $crate::udo_core::UdoLibVersion,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::get_impl_version(version)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_createOpFactory(
            core_type: $crate::udo_core::CoreType,
            infrastructure: *mut ::std::ffi::c_void,
            operation_type: *const ::std::ffi::c_char,
            num_of_static_params: u32,
            static_params: *mut $crate::udo_core::UdoParam,
            op_factory: *mut $crate::udo_core::UdoOpFactory,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::create_op_factory(
                core_type,
                infrastructure,
                operation_type,
                num_of_static_params,
                static_params,
                op_factory,
            )
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_createOperation(
            op_factory: $crate::udo_core::UdoOpFactory,
            per_op_infrastructure: *mut ::std::ffi::c_void,
            num_of_inputs: u32,
            inputs: *mut $crate::udo_core::UdoTensorParam,
            num_of_outputs: u32,
            outputs: *mut $crate::udo_core::UdoTensorParam,
            operation: *mut $crate::udo_core::UdoOperation,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::create_operation(
                op_factory,
                per_op_infrastructure,
                num_of_inputs,
                inputs,
                num_of_outputs,
                outputs,
                operation,
            )
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_executeOp(
            operation: $crate::udo_core::UdoOperation,
            blocking: bool,
            id: u32,
            notify: $crate::udo_core::UdoExternalNotify,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::execute_op(operation, blocking, id, notify)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_setOpIO(
            operation: $crate::udo_core::UdoOperation,
            inputs: *mut $crate::udo_core::UdoTensorParam,
            outputs: *mut $crate::udo_core::UdoTensorParam,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::set_op_io(operation, inputs, outputs)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_profileOp(
            operation: $crate::udo_core::UdoOperation,
            execution_time: *mut u32,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::profile_op(operation, execution_time)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_releaseOp(
            operation: $crate::udo_core::UdoOperation,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::release_op(operation)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_releaseOpFactory(
            op_factory: $crate::udo_core::UdoOpFactory,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::release_op_factory(op_factory)
        }

        #[no_mangle]
        pub extern "C" fn SnpeUdo_terminateImplLibrary() -> $crate::udo_core::ErrorType {
            $crate::entry::terminate_impl_library()
        }

        // Signatures must match what the host looks up.
        const _: () = {
            use $crate::udo_core as abi;
            let _: abi::InitImplLibraryFn = SnpeUdo_initImplLibrary;
            let _: abi::GetImpInfoFn = SnpeUdo_getImpInfo;
            let _: abi::GetVersionFn = SnpeUdo_getVersion;
            let _: abi::CreateOpFactoryFn = SnpeUdo_createOpFactory;
            let _: abi::CreateOperationFn = SnpeUdo_createOperation;
            let _: abi::ExecuteOpFn = SnpeUdo_executeOp;
            let _: abi::SetOpIoFn = SnpeUdo_setOpIO;
            let _: abi::ProfileOpFn = SnpeUdo_profileOp;
            let _: abi::ReleaseOpFn = SnpeUdo_releaseOp;
            let _: abi::ReleaseOpFactoryFn = SnpeUdo_releaseOpFactory;
            let _: abi::TerminateLibraryFn = SnpeUdo_terminateImplLibrary;
        };
    };
}

/// Exports the registration library entry points.
///
/// `$build` is a `fn() -> udo_core::Result<RegistrationLibrary>`, usually a
/// [`RegistrationBuilder`](crate::RegistrationBuilder) ending in `finish()`.
#[macro_export]
macro_rules! export_reg_library {
    ($build:path) => {
        #[no_mangle]
        pub extern "C" fn SnpeUdo_initRegLibrary() -> $crate::udo_core::ErrorType {
            $crate::entry::init_reg_library($build)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_getVersion(
            version: *mut *mut $crate::udo_core::UdoLibVersion,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::get_reg_version(version)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_getRegInfo(
            reg_info: *mut *mut $crate::udo_core::UdoRegInfo,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::get_reg_info(reg_info)
        }

        #[no_mangle]
        pub unsafe extern "C" fn SnpeUdo_validateOperation(
            definition: *mut $crate::udo_core::UdoOpDefinition,
        ) -> $crate::udo_core::ErrorType {
            $crate::entry::validate_operation(definition)
        }

        #[no_mangle]
        pub extern "C" fn SnpeUdo_terminateRegLibrary() -> $crate::udo_core::ErrorType {
            $crate::entry::terminate_reg_library()
        }

        const _: () = {
            use $crate::udo_core as abi;
            let _: abi::InitRegLibraryFn = SnpeUdo_initRegLibrary;
            let _: abi::GetVersionFn = SnpeUdo_getVersion;
            let _: abi::GetRegInfoFn = SnpeUdo_getRegInfo;
            let _: abi::ValidateOperationFn = SnpeUdo_validateOperation;
            let _: abi::TerminateLibraryFn = SnpeUdo_terminateRegLibrary;
        };
    };
}
