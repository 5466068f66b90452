//! # Root scopes
//!
//! The heap keeps a single stack of rooted handles that mirrors the native call
//! stack. Every allocation pushes its result onto that stack, so a freshly
//! allocated value cannot be reclaimed before the code that asked for it had a
//! chance to store it somewhere reachable.
//!
//! A [`RootScope`] marks a position on the stack and truncates back to it when
//! dropped. Scopes borrow their parent mutably, which makes them nest exactly
//! like call frames: an inner scope cannot outlive the frame that opened it, and
//! the outer scope is unusable until the inner one is gone. A value that has to
//! survive the scope that produced it leaves through [`RootScope::escape`],
//! which re-roots it in the parent's region of the stack.

use std::ops::{Deref, DerefMut};

use crate::{context::Context, value::Value};

pub struct RootScope<'a> {
    cx: &'a mut Context,
    base: usize,
}

impl<'a> RootScope<'a> {
    #[inline]
    pub(crate) fn new(cx: &'a mut Context) -> Self {
        let base = cx.heap().root_depth();
        Self { cx, base }
    }

    /// Registers `value` for the rest of this scope. Needed only for values
    /// that were not produced by an allocation in this scope, e.g. an element
    /// read out of a container that is about to be mutated.
    #[inline]
    pub fn root(&mut self, value: Value) -> Value {
        self.cx.heap_mut().push_root(value);
        value
    }

    /// Number of handles rooted by this scope so far.
    pub fn len(&self) -> usize {
        self.cx.heap().root_depth() - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unroots everything this scope has rooted so far.
    #[inline]
    pub fn reset(&mut self) {
        self.cx.heap_mut().truncate_roots(self.base);
    }

    /// Closes the scope, keeping `value` rooted in the enclosing one.
    #[inline]
    pub fn escape(mut self, value: Value) -> Value {
        let heap = self.cx.heap_mut();
        heap.truncate_roots(self.base);
        heap.push_root(value);
        self.base += 1;
        value
    }
}

impl Deref for RootScope<'_> {
    type Target = Context;
    fn deref(&self) -> &Self::Target {
        self.cx
    }
}

impl DerefMut for RootScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cx
    }
}

impl Drop for RootScope<'_> {
    #[inline]
    fn drop(&mut self) {
        self.cx.heap_mut().truncate_roots(self.base);
    }
}
