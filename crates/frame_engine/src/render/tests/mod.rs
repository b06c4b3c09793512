//! Frame protocol scenarios driven through the scripted device


use ash::vk;

use crate::core::config::RendererConfig;
use crate::render::backend::mock::{Call, MockDevice};
use crate::render::executor::{FrameExecutor, FrameOutcome};

const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

fn config(frames_in_flight: usize) -> RendererConfig {
    RendererConfig::new("protocol-test").with_max_frames_in_flight(frames_in_flight)
}

fn executor(frames_in_flight: usize) -> FrameExecutor<MockDevice> {
    executor_with(MockDevice::new(), frames_in_flight)
}

fn executor_with(device: MockDevice, frames_in_flight: usize) -> FrameExecutor<MockDevice> {
    let surface = device.surface();
    FrameExecutor::new(device, surface, &config(frames_in_flight), EXTENT).unwrap()
}

fn render(executor: &mut FrameExecutor<MockDevice>) -> FrameOutcome {
    executor.render(0.016, |_| {}).unwrap()
}

fn count(executor: &FrameExecutor<MockDevice>, predicate: impl Fn(&Call) -> bool) -> usize {
    executor.device().count(predicate)
}

fn submits(executor: &FrameExecutor<MockDevice>) -> usize {
    count(executor, |call| matches!(call, Call::QueueSubmit { .. }))
}

fn presents(executor: &FrameExecutor<MockDevice>) -> usize {
    count(executor, |call| matches!(call, Call::QueuePresent { .. }))
}

fn swapchain_creates(executor: &FrameExecutor<MockDevice>) -> usize {
    count(executor, |call| matches!(call, Call::CreateSwapchain { .. }))
}
