//! Operation records and the content operator table.

use std::any::Any;
use std::cell::OnceCell;
use std::fmt;

use lopdf::Object;

/// Operator groups, following the operator categories of the PDF reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    GeneralGraphicsState,
    SpecialGraphicsState,
    PathConstruction,
    PathPainting,
    Clipping,
    TextObject,
    TextState,
    TextPositioning,
    TextShowing,
    Type3Font,
    Color,
    Shading,
    InlineImage,
    XObject,
    MarkedContent,
    Compatibility,
}

macro_rules! operators {
    ($($(#[$doc:meta])* $variant:ident => $mnemonic:literal, $category:ident;)*) => {
        /// Every content stream operator the interpreter dispatches.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operator {
            $($(#[$doc])* $variant,)*
        }

        impl Operator {
            /// All operators, in table order.
            pub const ALL: &'static [Operator] = &[$(Operator::$variant,)*];

            /// Map an operator token to its operator, `None` for unknown tokens.
            pub fn from_token(token: &str) -> Option<Self> {
                match token {
                    $($mnemonic => Some(Operator::$variant),)*
                    _ => None,
                }
            }

            /// The token as written in content streams.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Operator::$variant => $mnemonic,)*
                }
            }

            pub fn category(self) -> Category {
                match self {
                    $(Operator::$variant => Category::$category,)*
                }
            }
        }
    };
}

operators! {
    /// `w`
    SetLineWidth => "w", GeneralGraphicsState;
    /// `J`
    SetLineCap => "J", GeneralGraphicsState;
    /// `j`
    SetLineJoin => "j", GeneralGraphicsState;
    /// `M`
    SetMiterLimit => "M", GeneralGraphicsState;
    /// `d`
    SetDash => "d", GeneralGraphicsState;
    /// `ri`
    SetRenderingIntent => "ri", GeneralGraphicsState;
    /// `i`
    SetFlatness => "i", GeneralGraphicsState;
    /// `gs`
    SetExtGState => "gs", GeneralGraphicsState;
    /// `q`
    Save => "q", SpecialGraphicsState;
    /// `Q`
    Restore => "Q", SpecialGraphicsState;
    /// `cm`
    ConcatMatrix => "cm", SpecialGraphicsState;
    MoveTo => "m", PathConstruction;
    LineTo => "l", PathConstruction;
    CurveTo => "c", PathConstruction;
    /// `v`: first control point is the current point.
    CurveToV => "v", PathConstruction;
    /// `y`: second control point is the end point.
    CurveToY => "y", PathConstruction;
    ClosePath => "h", PathConstruction;
    Rectangle => "re", PathConstruction;
    Stroke => "S", PathPainting;
    CloseStroke => "s", PathPainting;
    Fill => "f", PathPainting;
    /// `F`: obsolete spelling of `f`.
    FillCompat => "F", PathPainting;
    FillEvenOdd => "f*", PathPainting;
    FillStroke => "B", PathPainting;
    FillStrokeEvenOdd => "B*", PathPainting;
    CloseFillStroke => "b", PathPainting;
    CloseFillStrokeEvenOdd => "b*", PathPainting;
    /// `n`: end the path without painting.
    EndPath => "n", PathPainting;
    Clip => "W", Clipping;
    ClipEvenOdd => "W*", Clipping;
    BeginText => "BT", TextObject;
    EndText => "ET", TextObject;
    SetCharSpacing => "Tc", TextState;
    SetWordSpacing => "Tw", TextState;
    SetHorizontalScaling => "Tz", TextState;
    SetLeading => "TL", TextState;
    SetFont => "Tf", TextState;
    SetRenderMode => "Tr", TextState;
    SetRise => "Ts", TextState;
    MoveText => "Td", TextPositioning;
    MoveTextSetLeading => "TD", TextPositioning;
    SetTextMatrix => "Tm", TextPositioning;
    NextLine => "T*", TextPositioning;
    ShowText => "Tj", TextShowing;
    ShowTextAdjusted => "TJ", TextShowing;
    /// `'`: `T*` then `Tj`.
    NextLineShowText => "'", TextShowing;
    /// `"`: `Tw`, `Tc`, then `'`.
    SetSpacingNextLineShowText => "\"", TextShowing;
    /// `d0`
    SetGlyphWidth => "d0", Type3Font;
    /// `d1`
    SetGlyphWidthAndBounds => "d1", Type3Font;
    SetStrokeColorSpace => "CS", Color;
    SetFillColorSpace => "cs", Color;
    SetStrokeColor => "SC", Color;
    SetStrokeColorN => "SCN", Color;
    SetFillColor => "sc", Color;
    SetFillColorN => "scn", Color;
    SetStrokeGray => "G", Color;
    SetFillGray => "g", Color;
    SetStrokeRgb => "RG", Color;
    SetFillRgb => "rg", Color;
    SetStrokeCmyk => "K", Color;
    SetFillCmyk => "k", Color;
    PaintShading => "sh", Shading;
    /// `BI`: carries the whole inline image once tokenized.
    BeginInlineImage => "BI", InlineImage;
    InlineImageData => "ID", InlineImage;
    EndInlineImage => "EI", InlineImage;
    PaintXObject => "Do", XObject;
    MarkedContentPoint => "MP", MarkedContent;
    MarkedContentPointProperties => "DP", MarkedContent;
    BeginMarkedContent => "BMC", MarkedContent;
    BeginMarkedContentProperties => "BDC", MarkedContent;
    EndMarkedContent => "EMC", MarkedContent;
    BeginCompatibility => "BX", Compatibility;
    EndCompatibility => "EX", Compatibility;
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One operator with its operands, as it appears in a content stream.
///
/// Besides the operator token and operands, each operation owns a write-once
/// cache slot where handlers memoize objects derived from the operands (an
/// inline image, for instance), so running the same content twice does the
/// derivation once.
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
    kind: Option<Operator>,
    cache: OnceCell<Box<dyn Any>>,
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Object>) -> Self {
        let operator = operator.into();
        let kind = Operator::from_token(&operator);
        Self {
            operator,
            operands,
            kind,
            cache: OnceCell::new(),
        }
    }

    /// The dispatched operator, `None` for tokens without a handler.
    pub fn kind(&self) -> Option<Operator> {
        self.kind
    }

    /// Return the memoized value, computing it with `init` on first use.
    ///
    /// Returns `None` if the slot already holds a value of another type.
    pub fn cached<T: Any>(&self, init: impl FnOnce() -> T) -> Option<&T> {
        self.cache
            .get_or_init(|| Box::new(init()))
            .downcast_ref::<T>()
    }
}

impl Clone for Operation {
    fn clone(&self) -> Self {
        Self {
            operator: self.operator.clone(),
            operands: self.operands.clone(),
            kind: self.kind,
            cache: OnceCell::new(),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("operator", &self.operator)
            .field("operands", &self.operands)
            .field("cached", &self.cache.get().is_some())
            .finish()
    }
}

impl From<lopdf::content::Operation> for Operation {
    fn from(op: lopdf::content::Operation) -> Self {
        Operation::new(op.operator, op.operands)
    }
}
