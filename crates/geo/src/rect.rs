//! Rectangle geometry utilities for spatial operations.

use std::fmt::Debug;

pub type Point<T = f64> = geo_types::Point<T>;
use approx::{AbsDiffEq, RelativeEq};
use geo_types::CoordNum;
use num::Zero;

#[derive(Debug, PartialEq)]
pub struct Rect<T>
where
    T: Copy + CoordNum,
{
    top_left: Point<T>,
    bottom_right: Point<T>,
}

impl<T> Rect<T>
where
    T: Copy + CoordNum,
{
    pub fn from_points(p1: Point<T>, p2: Point<T>) -> Self {
        let top_left = Point::new(min(p1.x(), p2.x()), max(p1.y(), p2.y()));
        let bottom_right = Point::new(max(p1.x(), p2.x()), min(p1.y(), p2.y()));

        Rect { top_left, bottom_right }
    }

    pub fn from_nw_se(nw: Point<T>, se: Point<T>) -> Self {
        Rect {
            top_left: nw,
            bottom_right: se,
        }
    }

    pub fn width(&self) -> T
    where
        T: std::ops::Sub<Output = T> + Copy + PartialOrd + Zero,
    {
        if self.bottom_right.x() > self.top_left.x() {
            self.bottom_right.x() - self.top_left.x()
        } else {
            T::zero()
        }
    }

    pub fn height(&self) -> T
    where
        T: std::ops::Sub + Copy,
    {
        if self.bottom_right.y() > self.top_left.y() {
            self.bottom_right.y() - self.top_left.y()
        } else {
            self.top_left.y() - self.bottom_right.y()
        }
    }

    pub fn is_empty(&self) -> bool
    where
        T: PartialEq + std::ops::Sub + Zero + Copy + PartialOrd,
    {
        self.width() == T::zero() || self.height() == T::zero()
    }

    pub fn top_left(&self) -> Point<T> {
        self.top_left
    }

    pub fn top_right(&self) -> Point<T> {
        Point::new(self.bottom_right.x(), self.top_left.y())
    }

    pub fn bottom_left(&self) -> Point<T> {
        Point::new(self.top_left.x(), self.bottom_right.y())
    }

    pub fn bottom_right(&self) -> Point<T> {
        self.bottom_right
    }

    pub fn intersects(&self, other: &Rect<T>) -> bool
    where
        T: Copy + CoordNum,
    {
        !self.is_empty()
            && !other.is_empty()
            && self.top_left.x() < other.bottom_right.x()
            && self.bottom_right.x() > other.top_left.x()
            && self.top_left.y() > other.bottom_right.y()
            && self.bottom_right.y() < other.top_left.y()
    }

    pub fn intersection(&self, other: &Rect<T>) -> Rect<T>
    where
        T: CoordNum + PartialOrd,
    {
        if !self.intersects(other) {
            // Rectangles do not overlap, return an empty rectangle
            return Rect::from_points(Point::new(T::zero(), T::zero()), Point::new(T::zero(), T::zero()));
        }

        let top_left = Point::new(
            max(self.top_left.x(), other.top_left.x()),
            min(self.top_left.y(), other.top_left.y()),
        );
        let bottom_right = Point::new(
            min(self.bottom_right.x(), other.bottom_right.x()),
            max(self.bottom_right.y(), other.bottom_right.y()),
        );

        Rect::from_nw_se(top_left, bottom_right)
    }
}

fn min<T: PartialOrd>(a: T, b: T) -> T {
    if a < b { a } else { b }
}

fn max<T: PartialOrd>(a: T, b: T) -> T {
    if b > a { b } else { a }
}

impl From<Rect<f64>> for geo_types::Polygon<f64> {
    fn from(rect: Rect<f64>) -> geo_types::Polygon<f64> {
        geo_types::Polygon::new(
            geo_types::LineString::from(vec![
                rect.top_left(),
                rect.top_right(),
                rect.bottom_right,
                rect.bottom_left(),
                rect.top_left(),
            ]),
            Vec::default(),
        )
    }
}

impl<T> AbsDiffEq for Rect<T>
where
    T: PartialEq + std::fmt::Debug + Copy + CoordNum + AbsDiffEq<Epsilon = T>,
{
    type Epsilon = T;

    fn default_epsilon() -> Self::Epsilon {
        T::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.top_left.abs_diff_eq(&other.top_left, epsilon) && self.bottom_right.abs_diff_eq(&other.bottom_right, epsilon)
    }
}

impl<T: PartialEq + std::fmt::Debug + Copy + CoordNum + RelativeEq<Epsilon = T>> RelativeEq for Rect<T> {
    fn default_max_relative() -> Self::Epsilon {
        T::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool {
        Point::<T>::relative_eq(&self.top_left, &other.top_left, epsilon, max_relative)
            && Point::<T>::relative_eq(&self.bottom_right, &other.bottom_right, epsilon, max_relative)
    }
}
