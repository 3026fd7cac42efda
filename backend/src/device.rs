//! Devices: addressable compute + memory units.

use std::sync::Arc;

use snafu::ResultExt;
use veld_shape::layout::relayout_bytes;
use veld_shape::{ArrayShape, BorrowingLiteral, Layout, Literal};

use crate::backend::Platform;
use crate::error::{Result, ShapeSnafu, TransferSnafu};
use crate::memory::{Allocator, DeviceMemory};
use crate::queue::TransferQueue;

pub type DeviceId = usize;

/// Physical layout convention a device stores arrays in.
///
/// CPU devices keep the host-canonical row-major order; GPU and TPU devices
/// store column-major, so host materialization has to relayout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutConvention {
    RowMajor,
    ColumnMajor,
}

/// One addressable device within a backend: an allocator, a layout
/// convention, and the infeed/outfeed queue pair.
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    platform: Platform,
    allocator: Arc<dyn Allocator>,
    convention: LayoutConvention,
    infeed: TransferQueue,
    outfeed: TransferQueue,
}

impl Device {
    pub fn new(
        id: DeviceId,
        platform: Platform,
        allocator: Arc<dyn Allocator>,
        convention: LayoutConvention,
    ) -> Self {
        Self {
            id,
            platform,
            allocator,
            convention,
            infeed: TransferQueue::new(),
            outfeed: TransferQueue::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    /// Layout this device stores a rank-`rank` array in.
    pub fn device_layout(&self, rank: usize) -> Layout {
        match self.convention {
            LayoutConvention::RowMajor => Layout::row_major(rank),
            LayoutConvention::ColumnMajor => Layout::column_major(rank),
        }
    }

    pub fn infeed(&self) -> &TransferQueue {
        &self.infeed
    }

    pub fn outfeed(&self) -> &TransferQueue {
        &self.outfeed
    }

    /// Copy host bytes into a fresh device allocation.
    ///
    /// `bytes` describes a value laid out per `shape.layout_or_default()`;
    /// it is borrowed immutably until the transfer completes. Returns the
    /// allocation and the on-device shape (layout stamped with this
    /// device's convention).
    pub fn transfer_to_device(
        &self,
        bytes: &[u8],
        shape: &ArrayShape,
    ) -> Result<(DeviceMemory, ArrayShape)> {
        snafu::ensure!(
            bytes.len() == shape.byte_size(),
            crate::error::SizeMismatchSnafu { expected: shape.byte_size(), actual: bytes.len() }
        );

        let source_layout = shape.layout_or_default();
        let device_layout = self.device_layout(shape.rank());
        let on_device_shape =
            shape.clone().with_layout(device_layout.clone()).context(ShapeSnafu)?;

        let memory = self.allocator.alloc(bytes.len())?;
        let device_bytes = relayout_bytes(
            bytes,
            shape.dimensions(),
            shape.element_type().size_in_bytes(),
            &source_layout,
            &device_layout,
        );
        memory.fill_from(&device_bytes)?;
        memory.ready().set_ready();

        tracing::debug!(
            device = self.id,
            platform = %self.platform,
            bytes = bytes.len(),
            "transferred host buffer to device"
        );

        Ok((memory, on_device_shape))
    }

    /// Snapshot a device allocation as a host literal carrying the
    /// on-device shape. Waits for the producing work first.
    pub fn transfer_from_device(
        &self,
        memory: &DeviceMemory,
        shape: &ArrayShape,
    ) -> Result<Literal> {
        memory.ready().wait();
        let bytes = memory.snapshot()?;
        Literal::new(shape.clone(), bytes).context(ShapeSnafu)
    }

    /// Enqueue infeed payloads, one queue entry per component, in order.
    /// The device-side enqueue is the copy point; the borrowed payloads are
    /// released when this returns.
    pub fn transfer_to_infeed(&self, literal: &BorrowingLiteral<'_>) -> Result<()> {
        for owned in literal.to_literals() {
            self.infeed.push(owned);
        }
        tracing::debug!(device = self.id, components = literal.components().len(), "infeed transfer");
        Ok(())
    }

    /// Block until the device produces an outfeed value matching
    /// `expected`, then hand it out.
    pub fn transfer_from_outfeed(&self, expected: &ArrayShape) -> Result<Literal> {
        let literal = self.outfeed.pop_blocking();
        snafu::ensure!(
            literal.shape().element_type() == expected.element_type()
                && literal.shape().dimensions() == expected.dimensions(),
            TransferSnafu {
                reason: format!(
                    "outfeed produced {:?}, expected {:?}",
                    literal.shape(),
                    expected
                ),
            }
        );
        Ok(literal)
    }
}
