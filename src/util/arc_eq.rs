use std::cmp::{PartialEq, Eq};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{Arc};

/** A thin wrapper around an Arc<T> that uses pointer equality. */
pub struct ArcEq<T>(pub Arc<T>);

impl<T> ArcEq<T> {
    pub fn new(t: T) -> Self {
        ArcEq(Arc::new(t))
    }
}

impl<T> std::ops::Deref for ArcEq<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target { self.0.deref() }
}

impl<T: Debug> Debug for ArcEq<T> {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        (*self.0).fmt(f)
    }
}

impl<T> Clone for ArcEq<T> {
    fn clone(&self) -> Self {
        ArcEq(self.0.clone())
    }
}

impl<T> PartialEq for ArcEq<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for ArcEq<T> {}

impl<T> Hash for ArcEq<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state)
    }
}

//-----------------------------------------------------------------------------
