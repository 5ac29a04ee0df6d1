// MIT License
// Copyright 2026--present ipidrv developers

//! DLPack tensors at the C callback boundary.
//!
//! Callback potentials receive positions and the cell as **borrowed** CPU
//! tensors (the deleter frees metadata only) and hand forces back as an
//! **owned** tensor (the deleter frees the data too). Only `f64` tensors are
//! ever exchanged, so a single manager context covers both cases.

use std::os::raw::c_void;

use dlpk::sys::{
    DLDataType, DLDataTypeCode, DLDevice, DLDeviceType, DLManagedTensorVersioned, DLPackVersion,
    DLTensor, DLPACK_FLAG_BITMASK_IS_COPIED,
};

fn row_major_strides(shape: &[i64]) -> Vec<i64> {
    let mut strides = vec![1i64; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn dtype_f64() -> DLDataType {
    DLDataType {
        code: DLDataTypeCode::kDLFloat,
        bits: 64,
        lanes: 1,
    }
}

fn cpu_device() -> DLDevice {
    DLDevice {
        device_type: DLDeviceType::kDLCPU,
        device_id: 0,
    }
}

/// Keeps shape/strides alive, plus the data buffer when the tensor owns it.
struct F64TensorContext {
    _owned: Option<Vec<f64>>,
    shape: Vec<i64>,
    strides: Vec<i64>,
}

unsafe extern "C" fn f64_deleter(ptr: *mut DLManagedTensorVersioned) {
    if ptr.is_null() {
        return;
    }
    let ctx = unsafe { (*ptr).manager_ctx.cast::<F64TensorContext>() };
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx) });
    }
    drop(unsafe { Box::from_raw(ptr) });
}

fn make_f64_tensor(
    data: *mut f64,
    owned: Option<Vec<f64>>,
    shape: Vec<i64>,
) -> *mut DLManagedTensorVersioned {
    let flags = if owned.is_some() {
        DLPACK_FLAG_BITMASK_IS_COPIED
    } else {
        0
    };
    let strides = row_major_strides(&shape);
    let mut ctx = Box::new(F64TensorContext {
        _owned: owned,
        shape,
        strides,
    });

    let dl_tensor = DLTensor {
        data: data.cast::<c_void>(),
        device: cpu_device(),
        ndim: ctx.shape.len() as i32,
        dtype: dtype_f64(),
        shape: ctx.shape.as_mut_ptr(),
        strides: ctx.strides.as_mut_ptr(),
        byte_offset: 0,
    };

    Box::into_raw(Box::new(DLManagedTensorVersioned {
        version: DLPackVersion { major: 1, minor: 0 },
        manager_ctx: Box::into_raw(ctx).cast(),
        deleter: Some(f64_deleter),
        flags,
        dl_tensor,
    }))
}

/// Borrow `data` as a row-major CPU tensor of `shape`.
///
/// # Safety
/// `data` must outlive the returned tensor and hold `product(shape)` values.
pub(crate) unsafe fn borrow_f64_tensor(
    data: *mut f64,
    shape: Vec<i64>,
) -> *mut DLManagedTensorVersioned {
    make_f64_tensor(data, None, shape)
}

/// Move `data` into a tensor that frees it on delete.
pub(crate) fn own_f64_tensor(mut data: Vec<f64>, shape: Vec<i64>) -> *mut DLManagedTensorVersioned {
    let ptr = data.as_mut_ptr();
    make_f64_tensor(ptr, Some(data), shape)
}

/// Copy an `[n, 3]` f64 CPU tensor into coordinate rows.
///
/// # Safety
/// `tensor` must be null or a valid `DLManagedTensorVersioned`.
pub(crate) unsafe fn read_nx3(
    tensor: *const DLManagedTensorVersioned,
    expected_n: usize,
) -> Result<Vec<[f64; 3]>, String> {
    if tensor.is_null() {
        return Err("forces tensor is NULL".into());
    }
    let t = unsafe { &(*tensor).dl_tensor };
    if t.device.device_type != DLDeviceType::kDLCPU {
        return Err("forces tensor is not on CPU".into());
    }
    if t.dtype != dtype_f64() {
        return Err(format!("forces: expected f64, got {:?}", t.dtype));
    }
    if t.ndim != 2 {
        return Err(format!("forces: expected ndim=2, got {}", t.ndim));
    }
    let shape = unsafe { std::slice::from_raw_parts(t.shape, 2) };
    if shape[0] as usize != expected_n || shape[1] != 3 {
        return Err(format!(
            "forces: expected shape [{expected_n}, 3], got [{}, {}]",
            shape[0], shape[1]
        ));
    }
    if !t.strides.is_null() {
        let strides = unsafe { std::slice::from_raw_parts(t.strides, 2) };
        if strides != [3, 1] {
            return Err(format!("forces: expected row-major strides, got {strides:?}"));
        }
    }
    let base = unsafe { (t.data as *const u8).add(t.byte_offset as usize) } as *const f64;
    let flat = unsafe { std::slice::from_raw_parts(base, expected_n * 3) };
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

// ---------------------------------------------------------------------------
// C-exported tensor functions
// ---------------------------------------------------------------------------

/// Create an **owning** `[rows, cols]` f64 CPU tensor by copying `data`.
///
/// This is how a callback returns forces: fill a local buffer, copy it into a
/// tensor with this function, and store the pointer in `output->forces`.
///
/// # Safety
/// `data` must point to at least `rows * cols` contiguous `f64` values.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_tensor_owned_cpu_f64_2d(
    data: *const f64,
    rows: i64,
    cols: i64,
) -> *mut DLManagedTensorVersioned {
    let len = (rows.max(0) * cols.max(0)) as usize;
    let copy = if len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
    };
    own_f64_tensor(copy, vec![rows, cols])
}

/// Free a DLPack tensor by invoking its deleter. `NULL` is a no-op.
///
/// # Safety
/// `tensor` must be null or a valid `DLManagedTensorVersioned`.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_tensor_free(tensor: *mut DLManagedTensorVersioned) {
    if tensor.is_null() {
        return;
    }
    if let Some(deleter) = unsafe { (*tensor).deleter } {
        unsafe { deleter(tensor) };
    }
}

/// Raw data pointer of a tensor (already adjusted for `byte_offset`).
///
/// # Safety
/// `tensor` must be a valid, non-null `DLManagedTensorVersioned*`.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_tensor_data(
    tensor: *const DLManagedTensorVersioned,
) -> *const c_void {
    let t = unsafe { &(*tensor).dl_tensor };
    unsafe { (t.data as *const u8).add(t.byte_offset as usize) }.cast()
}

/// Shape array of a tensor; the number of dimensions goes to `*ndim_out`.
///
/// # Safety
/// Both pointers must be valid and non-null.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_tensor_shape(
    tensor: *const DLManagedTensorVersioned,
    ndim_out: *mut i32,
) -> *const i64 {
    let t = unsafe { &(*tensor).dl_tensor };
    unsafe { *ndim_out = t.ndim };
    t.shape as *const i64
}
