use ellipsize::FontContext;

/// Handle for an active resize subscription.
///
/// Not `Clone`: the controller hands the same value back to
/// [`ReflowHost::unsubscribe_resize`] exactly once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ResizeSubscription(u64);

impl ResizeSubscription {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Capabilities the controller needs from the surrounding UI.
///
/// Hosts deliver events back by calling [`crate::ReflowController::on_resize`],
/// [`crate::ReflowController::on_frame`] and
/// [`crate::ReflowController::on_font_change`].
pub trait ReflowHost {
    /// Available width of the rendering container, in pixels. Zero or
    /// non-finite while layout has not happened yet.
    fn container_width(&self) -> f32;

    /// Font currently applied to the rendered text.
    fn computed_font(&self) -> FontContext;

    /// Ask for one `on_frame` call on the next rendering frame.
    fn request_frame(&mut self);

    /// Start delivering resize notifications.
    fn subscribe_resize(&mut self) -> ResizeSubscription;

    /// Stop delivering resize notifications for `subscription`.
    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription);
}
