use crate::core::bounds::Extent;
use crate::core::viewport::{Frame, ScreenRect};
use crate::tiles::pool::ImageHandle;

/// The surface a [`TileRenderer`](super::renderer::TileRenderer) draws into.
///
/// The host owns the viewport: the renderer reads the extent and frame each
/// paint and may write a snapped extent back.
pub trait RenderHost {
    /// Visible extent in projected meters
    fn extent(&self) -> Extent;

    /// Replace the visible extent, e.g. after snapping to a zoom level
    fn set_extent(&mut self, extent: Extent);

    /// Pixel rectangle of the map frame
    fn frame(&self) -> Frame;

    /// Start a clipped, alpha-composited drawing pass.
    fn begin_pass(&mut self, _clip: ScreenRect, _alpha: f32) {}

    fn draw_image(&mut self, image: &ImageHandle, rect: ScreenRect, smoothing: bool);

    fn end_pass(&mut self) {}

    /// A tile finished loading and another paint would show it
    fn request_render(&mut self);

    /// Every tile tracked this session has settled
    fn notify_finished(&mut self);
}
